//! Dependency-edge construction and stable topological ordering.

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use tracing::debug;

use parche_model::{AttributeValue, AttributeVariant, InletRef, ObjectId, Patch};

use crate::error::GraphError;

/// A linear object ordering consistent with all dependency edges.
///
/// Produced by [`resolve`]; immutable once computed. The code generator walks
/// it front to back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedOrder {
    objects: Vec<ObjectId>,
}

impl ResolvedOrder {
    /// Ordered live object ids.
    pub fn objects(&self) -> &[ObjectId] {
        &self.objects
    }

    /// Position of an object in emission order.
    pub fn position(&self, id: ObjectId) -> Option<usize> {
        self.objects.iter().position(|o| *o == id)
    }

    /// Number of ordered objects.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Whether the ordering is empty.
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

/// Validate a patch, returning every finding (empty = well-formed).
pub fn validate(patch: &Patch) -> Vec<GraphError> {
    match resolve(patch) {
        Ok(_) => Vec::new(),
        Err(errors) => errors,
    }
}

/// Compute the deterministic object ordering for a patch.
///
/// Edges: A→B when an outlet of A feeds an inlet of B through a net, or when
/// an object-reference attribute of A names B. The sort is Kahn's algorithm
/// with ties broken by authoring order, so an edit that does not change
/// dependencies does not reshuffle generated code.
///
/// On failure returns the complete list of findings: every unconnected
/// required inlet, every dangling reference, and (if present) one minimal
/// cycle.
pub fn resolve(patch: &Patch) -> Result<ResolvedOrder, Vec<GraphError>> {
    let ids: Vec<ObjectId> = patch.objects().map(|(id, _)| id).collect();
    let index_of: HashMap<ObjectId, usize> =
        ids.iter().enumerate().map(|(i, id)| (*id, i)).collect();
    let n = ids.len();

    let mut errors = Vec::new();
    let mut adjacency: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut indegree = vec![0usize; n];
    let mut seen_edges: HashSet<(usize, usize)> = HashSet::new();
    // Deduplicated so parallel nets never inflate in-degrees. Self-loops are
    // kept; they surface as one-object cycles.
    let mut add_edge = |from: usize,
                        to: usize,
                        adjacency: &mut Vec<Vec<usize>>,
                        indegree: &mut Vec<usize>| {
        if seen_edges.insert((from, to)) {
            adjacency[from].push(to);
            indegree[to] += 1;
        }
    };

    // Net edges: producer before every consumer.
    for net in patch.nets() {
        let Some(&from) = index_of.get(&net.source.object) else {
            continue;
        };
        for sink in &net.sinks {
            if let Some(&to) = index_of.get(&sink.object) {
                add_edge(from, to, &mut adjacency, &mut indegree);
            }
        }
    }

    // Attribute edges and dangling-reference findings.
    for (a, id) in ids.iter().enumerate() {
        let Some(obj) = patch.object(*id) else {
            continue;
        };
        for attr in &obj.attributes {
            let AttributeVariant::ObjectRef { expected_type } = &attr.variant else {
                continue;
            };
            let AttributeValue::ObjectRef(target) = &attr.value else {
                continue;
            };
            if target.is_empty() {
                continue;
            }
            let resolved = patch.find(target).filter(|tid| {
                expected_type.as_ref().map_or(true, |ty| {
                    patch.object(*tid).is_some_and(|t| t.type_name == *ty)
                })
            });
            match resolved {
                Some(tid) => {
                    add_edge(a, index_of[&tid], &mut adjacency, &mut indegree);
                }
                None => errors.push(GraphError::DanglingReference {
                    object: obj.name.clone(),
                    attribute: attr.name.clone(),
                    target: target.clone(),
                }),
            }
        }
    }

    // Unresolved required inlets.
    for (id, obj) in patch.objects() {
        for (i, inlet) in obj.inlets.iter().enumerate() {
            let endpoint = InletRef {
                object: id,
                inlet: i,
            };
            if inlet.required && patch.net_for_inlet(endpoint).is_none() {
                errors.push(GraphError::UnresolvedInput {
                    object: obj.name.clone(),
                    inlet: inlet.name.clone(),
                });
            }
        }
    }

    // Kahn's sort; the ready set is ordered by slot index, which is
    // authoring order, so ties never reshuffle.
    let mut ready: BTreeSet<usize> = (0..n).filter(|&i| indegree[i] == 0).collect();
    let mut sorted = Vec::with_capacity(n);
    let mut placed = vec![false; n];
    while let Some(&next) = ready.iter().next() {
        ready.remove(&next);
        placed[next] = true;
        sorted.push(ids[next]);
        for &succ in &adjacency[next] {
            indegree[succ] -= 1;
            if indegree[succ] == 0 {
                ready.insert(succ);
            }
        }
    }

    if sorted.len() < n {
        let remaining: Vec<usize> = (0..n).filter(|&i| !placed[i]).collect();
        if let Some(cycle) = shortest_cycle(&adjacency, &remaining) {
            let names = cycle
                .iter()
                .filter_map(|&i| patch.object(ids[i]).map(|o| o.name.clone()))
                .collect();
            errors.push(GraphError::CyclicDependency { cycle: names });
        }
    }

    if errors.is_empty() {
        debug!(objects = sorted.len(), "resolved patch ordering");
        Ok(ResolvedOrder { objects: sorted })
    } else {
        debug!(findings = errors.len(), "patch validation failed");
        Err(errors)
    }
}

/// Find a minimal cycle within the given node subset via BFS from each node.
fn shortest_cycle(adjacency: &[Vec<usize>], remaining: &[usize]) -> Option<Vec<usize>> {
    let in_remaining: HashSet<usize> = remaining.iter().copied().collect();
    let mut best: Option<Vec<usize>> = None;

    for &start in remaining {
        let mut parent: HashMap<usize, usize> = HashMap::new();
        let mut queue = VecDeque::from([start]);
        let mut visited: HashSet<usize> = HashSet::from([start]);
        'bfs: while let Some(node) = queue.pop_front() {
            for &succ in &adjacency[node] {
                if !in_remaining.contains(&succ) {
                    continue;
                }
                if succ == start {
                    // Reconstruct start → ... → node, which closes at start.
                    let mut path = vec![node];
                    let mut cur = node;
                    while cur != start {
                        cur = parent[&cur];
                        path.push(cur);
                    }
                    path.reverse();
                    if best.as_ref().map_or(true, |b| path.len() < b.len()) {
                        best = Some(path);
                    }
                    break 'bfs;
                }
                if visited.insert(succ) {
                    parent.insert(succ, node);
                    queue.push_back(succ);
                }
            }
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use parche_model::{ObjectLibrary, OutletRef};

    fn wire(patch: &mut Patch, from: &str, outlet: usize, to: &str, inlet: usize) {
        let source = OutletRef {
            object: patch.find(from).unwrap(),
            outlet,
        };
        let sink = InletRef {
            object: patch.find(to).unwrap(),
            inlet,
        };
        patch.connect(source, sink).unwrap();
    }

    fn add(patch: &mut Patch, lib: &ObjectLibrary, ty: &str, name: &str) -> ObjectId {
        patch.add_instance(lib.instantiate(ty, name).unwrap()).unwrap()
    }

    #[test]
    fn chain_orders_producer_first() {
        let lib = ObjectLibrary::with_builtins();
        let mut patch = Patch::new();
        // Author in reverse to prove order comes from edges, not authoring.
        add(&mut patch, &lib, "io/dac", "Out");
        add(&mut patch, &lib, "mix/gain", "Gain 1");
        add(&mut patch, &lib, "osc/sine", "Osc 1");
        wire(&mut patch, "Osc 1", 0, "Gain 1", 0);
        wire(&mut patch, "Gain 1", 0, "Out", 0);

        let order = resolve(&patch).unwrap();
        let pos = |name: &str| order.position(patch.find(name).unwrap()).unwrap();
        assert!(pos("Osc 1") < pos("Gain 1"));
        assert!(pos("Gain 1") < pos("Out"));
    }

    #[test]
    fn independent_objects_keep_authoring_order() {
        let lib = ObjectLibrary::with_builtins();
        let mut patch = Patch::new();
        let a = add(&mut patch, &lib, "ctrl/dial", "Dial 1");
        let b = add(&mut patch, &lib, "ctrl/dial", "Dial 2");
        let c = add(&mut patch, &lib, "ctrl/dial", "Dial 3");
        let order = resolve(&patch).unwrap();
        assert_eq!(order.objects(), &[a, b, c]);
    }

    #[test]
    fn unconnected_mandatory_inlet_is_exactly_one_finding() {
        let lib = ObjectLibrary::with_builtins();
        let mut patch = Patch::new();
        add(&mut patch, &lib, "osc/sine", "O1");
        add(&mut patch, &lib, "io/dac", "O2");

        let errors = validate(&patch);
        assert_eq!(
            errors,
            vec![GraphError::UnresolvedInput {
                object: "O2".to_string(),
                inlet: "in".to_string(),
            }]
        );
    }

    #[test]
    fn cycle_is_named_minimally() {
        let lib = ObjectLibrary::with_builtins();
        let mut patch = Patch::new();
        add(&mut patch, &lib, "mix/gain", "Gain 1");
        add(&mut patch, &lib, "mix/gain", "Gain 2");
        wire(&mut patch, "Gain 1", 0, "Gain 2", 0);
        wire(&mut patch, "Gain 2", 0, "Gain 1", 0);

        let errors = validate(&patch);
        assert_eq!(errors.len(), 1);
        match &errors[0] {
            GraphError::CyclicDependency { cycle } => {
                assert_eq!(cycle.len(), 2);
                assert!(cycle.contains(&"Gain 1".to_string()));
                assert!(cycle.contains(&"Gain 2".to_string()));
            }
            other => panic!("expected cycle, got {other:?}"),
        }
    }

    #[test]
    fn dangling_reference_to_missing_instance() {
        let lib = ObjectLibrary::with_builtins();
        let mut patch = Patch::new();
        let read = add(&mut patch, &lib, "table/read", "Read 1");
        add(&mut patch, &lib, "ctrl/dial", "Dial 1");
        wire(&mut patch, "Dial 1", 0, "Read 1", 0);
        patch
            .set_attribute_value(
                read,
                "table",
                AttributeValue::ObjectRef("Table 1".to_string()),
            )
            .unwrap();

        let errors = validate(&patch);
        assert_eq!(
            errors,
            vec![GraphError::DanglingReference {
                object: "Read 1".to_string(),
                attribute: "table".to_string(),
                target: "Table 1".to_string(),
            }]
        );
    }

    #[test]
    fn type_incompatible_reference_is_dangling() {
        let lib = ObjectLibrary::with_builtins();
        let mut patch = Patch::new();
        let read = add(&mut patch, &lib, "table/read", "Read 1");
        add(&mut patch, &lib, "ctrl/dial", "Dial 1");
        add(&mut patch, &lib, "osc/sine", "NotATable");
        wire(&mut patch, "Dial 1", 0, "Read 1", 0);
        patch
            .set_attribute_value(
                read,
                "table",
                AttributeValue::ObjectRef("NotATable".to_string()),
            )
            .unwrap();

        let errors = validate(&patch);
        assert!(matches!(
            errors.as_slice(),
            [GraphError::DanglingReference { target, .. }] if target == "NotATable"
        ));
    }

    #[test]
    fn object_reference_orders_referrer_before_target() {
        let lib = ObjectLibrary::with_builtins();
        let mut patch = Patch::new();
        // Author the table first so authoring order alone would place it
        // ahead; the attribute edge must override that.
        add(&mut patch, &lib, "table/alloc", "Table 1");
        let read = add(&mut patch, &lib, "table/read", "Read 1");
        add(&mut patch, &lib, "ctrl/dial", "Dial 1");
        wire(&mut patch, "Dial 1", 0, "Read 1", 0);
        patch
            .set_attribute_value(
                read,
                "table",
                AttributeValue::ObjectRef("Table 1".to_string()),
            )
            .unwrap();

        let order = resolve(&patch).unwrap();
        let pos = |name: &str| order.position(patch.find(name).unwrap()).unwrap();
        assert!(pos("Read 1") < pos("Table 1"));
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Any forward-wired gain chain resolves with every producer
            /// ahead of its consumer, no matter the authoring permutation.
            #[test]
            fn producers_precede_consumers(
                len in 2usize..12,
                seed in any::<u64>(),
            ) {
                use rand::{Rng, SeedableRng, rngs::StdRng};
                let lib = ObjectLibrary::with_builtins();
                let mut patch = Patch::new();
                let mut rng = StdRng::seed_from_u64(seed);

                let names: Vec<String> =
                    (0..len).map(|i| format!("Gain {i}")).collect();
                let mut authoring: Vec<usize> = (0..len).collect();
                // Fisher-Yates so authoring order is independent of wiring.
                for i in (1..len).rev() {
                    authoring.swap(i, rng.gen_range(0..=i));
                }
                for &i in &authoring {
                    add(&mut patch, &lib, "mix/gain", &names[i]);
                }
                for window in names.windows(2) {
                    wire(&mut patch, &window[0], 0, &window[1], 0);
                }
                // Head of the chain needs its required inlet fed.
                add(&mut patch, &lib, "osc/sine", "Src");
                wire(&mut patch, "Src", 0, &names[0], 0);

                let order = resolve(&patch).unwrap();
                let pos = |name: &str| {
                    order.position(patch.find(name).unwrap()).unwrap()
                };
                for window in names.windows(2) {
                    prop_assert!(pos(&window[0]) < pos(&window[1]));
                }
            }
        }
    }

    #[test]
    fn all_findings_are_reported_together() {
        let lib = ObjectLibrary::with_builtins();
        let mut patch = Patch::new();
        let read = add(&mut patch, &lib, "table/read", "Read 1");
        add(&mut patch, &lib, "io/dac", "Out");
        patch
            .set_attribute_value(
                read,
                "table",
                AttributeValue::ObjectRef("Missing".to_string()),
            )
            .unwrap();

        let errors = validate(&patch);
        // One dangling reference, plus two unresolved required inlets
        // (Read 1's index and Out's in).
        assert_eq!(errors.len(), 3);
        assert!(errors.iter().any(|e| matches!(e, GraphError::DanglingReference { .. })));
        assert_eq!(
            errors
                .iter()
                .filter(|e| matches!(e, GraphError::UnresolvedInput { .. }))
                .count(),
            2
        );
    }
}
