//! Fragment emission and the incremental cache.

use std::collections::HashMap;
use std::fmt::Write as _;

use sha2::{Digest, Sha256};
use tracing::debug;

use parche_graph::ResolvedOrder;
use parche_model::{InletRef, ObjectId, ObjectInstance, Patch, SignalType, instance_symbol};

use crate::error::CodegenError;
use crate::fingerprint::Fingerprint;
use crate::manifest::{Manifest, ManifestObject, ManifestParam};

/// Per-object record from a previous generation run.
#[derive(Debug, Clone, PartialEq, Eq)]
struct CacheEntry {
    id: ObjectId,
    fingerprint: Fingerprint,
    param_base: u32,
    fragment: String,
}

/// Fingerprint table plus cached fragments, keyed by emission position.
///
/// A cached fragment is reused only when the same object sits at the same
/// emission position with the same fingerprint and the same parameter index
/// base. An order divergence at position k therefore invalidates everything
/// from k on, which is required: parameter indices are positional and shift
/// with the ordering.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenCache {
    entries: Vec<CacheEntry>,
}

impl GenCache {
    /// Fingerprint recorded for an object, if it was emitted.
    pub fn fingerprint(&self, id: ObjectId) -> Option<Fingerprint> {
        self.entries
            .iter()
            .find(|e| e.id == id)
            .map(|e| e.fingerprint)
    }

    /// Cached source fragment for an object, if it was emitted.
    pub fn fragment(&self, id: ObjectId) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.id == id)
            .map(|e| e.fragment.as_str())
    }

    /// Number of cached objects.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Everything one generation run produces.
#[derive(Debug, Clone)]
pub struct GenResult {
    /// Complete generated source. Diagnostic only when `errors` is non-empty.
    pub source: String,
    /// Symbol and parameter-index contract for the compiler and the session.
    pub manifest: Manifest,
    /// Cache to feed into the next run.
    pub cache: GenCache,
    /// Aggregate findings; empty means the artifact is deployable.
    pub errors: Vec<CodegenError>,
    /// How many fragments were reused verbatim from the previous cache.
    pub reused: usize,
}

/// Generate source for every object in resolver order.
///
/// Objects whose attributes fail to serialize are skipped with an
/// [`CodegenError::InvalidAttributeValue`]; instance names that legalize to
/// a colliding identifier are all skipped with one
/// [`CodegenError::SymbolCollision`] per contested symbol. Generation
/// continues for independent objects either way.
pub fn generate(patch: &Patch, order: &ResolvedOrder, cache: Option<&GenCache>) -> GenResult {
    let mut errors = Vec::new();

    // Legalize names up front so collisions are caught before emission.
    let symbols: HashMap<ObjectId, String> = order
        .objects()
        .iter()
        .filter_map(|&id| patch.object(id).map(|obj| (id, instance_symbol(&obj.name))))
        .collect();
    let skipped = collect_collisions(patch, order, &symbols, &mut errors);

    let mut fragments: Vec<String> = Vec::new();
    let mut run_symbols: Vec<String> = Vec::new();
    let mut manifest = Manifest::default();
    let mut next_cache = GenCache::default();
    let mut param_base: u32 = 0;
    let mut reused = 0;

    for &id in order.objects() {
        if skipped.contains(&id) {
            continue;
        }
        let Some(obj) = patch.object(id) else {
            continue;
        };
        let symbol = &symbols[&id];
        let fingerprint = object_fingerprint(patch, id, obj);

        let position = fragments.len();
        let cached = cache.and_then(|c| c.entries.get(position)).filter(|e| {
            e.id == id && e.fingerprint == fingerprint && e.param_base == param_base
        });
        let fragment = if let Some(entry) = cached {
            reused += 1;
            entry.fragment.clone()
        } else {
            match emit_fragment(patch, id, obj, symbol, &symbols, param_base) {
                Ok(text) => text,
                Err(err) => {
                    errors.push(err);
                    continue;
                }
            }
        };

        manifest.objects.push(ManifestObject {
            instance: obj.name.clone(),
            type_name: obj.type_name.clone(),
            symbol: symbol.clone(),
            params: obj
                .parameters
                .iter()
                .enumerate()
                .map(|(i, p)| ManifestParam {
                    name: p.name.clone(),
                    index: param_base + i as u32,
                })
                .collect(),
        });
        next_cache.entries.push(CacheEntry {
            id,
            fingerprint,
            param_base,
            fragment: fragment.clone(),
        });
        fragments.push(fragment);
        run_symbols.push(symbol.clone());
        param_base += obj.parameters.len() as u32;
    }
    manifest.param_count = param_base;

    debug!(
        objects = fragments.len(),
        reused,
        params = manifest.param_count,
        findings = errors.len(),
        "generation pass complete"
    );

    GenResult {
        source: assemble(&fragments, &run_symbols, &manifest),
        manifest,
        cache: next_cache,
        errors,
        reused,
    }
}

/// Instance content hash extended with inlet wiring.
///
/// The instance hash covers name, iolets, attributes and parameters; the
/// producing endpoint of each inlet also shapes the run call, so it is
/// folded in here to keep the reuse decision sound under rewiring.
fn object_fingerprint(patch: &Patch, id: ObjectId, obj: &ObjectInstance) -> Fingerprint {
    let mut hasher = Sha256::new();
    obj.hash_into(&mut hasher);
    for inlet in 0..obj.inlets.len() {
        match patch.net_for_inlet(InletRef { object: id, inlet }) {
            Some(net) => {
                hasher.update([1u8]);
                if let Some(producer) = patch.object(net.source.object) {
                    hasher.update((producer.name.len() as u64).to_le_bytes());
                    hasher.update(producer.name.as_bytes());
                }
                hasher.update((net.source.outlet as u64).to_le_bytes());
            }
            None => hasher.update([0u8]),
        }
    }
    Fingerprint::finish(hasher)
}

/// Report every contested symbol and return the ids to skip.
fn collect_collisions(
    patch: &Patch,
    order: &ResolvedOrder,
    symbols: &HashMap<ObjectId, String>,
    errors: &mut Vec<CodegenError>,
) -> Vec<ObjectId> {
    let mut by_symbol: HashMap<&str, Vec<ObjectId>> = HashMap::new();
    for &id in order.objects() {
        if let Some(symbol) = symbols.get(&id) {
            by_symbol.entry(symbol).or_default().push(id);
        }
    }
    let mut contested: Vec<(&str, Vec<ObjectId>)> = by_symbol
        .into_iter()
        .filter(|(_, ids)| ids.len() > 1)
        .collect();
    // Authoring order keeps the error list deterministic.
    for (_, ids) in &mut contested {
        ids.sort_unstable();
    }
    contested.sort_by_key(|(_, ids)| ids[0]);

    let mut skipped = Vec::new();
    for (symbol, ids) in contested {
        errors.push(CodegenError::SymbolCollision {
            symbol: symbol.to_string(),
            objects: ids
                .iter()
                .filter_map(|&id| patch.object(id).map(|o| o.name.clone()))
                .collect(),
        });
        skipped.extend(ids);
    }
    skipped
}

fn emit_fragment(
    patch: &Patch,
    id: ObjectId,
    obj: &ObjectInstance,
    symbol: &str,
    symbols: &HashMap<ObjectId, String>,
    param_base: u32,
) -> Result<String, CodegenError> {
    let ty = type_symbol(&obj.type_name);
    let mut out = String::new();
    let _ = writeln!(
        out,
        "/* {} ({}), params [{}..{}) */",
        obj.name,
        obj.type_name,
        param_base,
        param_base + obj.parameters.len() as u32
    );

    if !obj.attributes.is_empty() {
        let _ = writeln!(out, "static const {ty}_attrs attr_{symbol} = {{");
        for attr in &obj.attributes {
            let literal =
                attr.to_literal()
                    .map_err(|err| CodegenError::InvalidAttributeValue {
                        object: obj.name.clone(),
                        attribute: attr.name.clone(),
                        reason: err.to_string(),
                    })?;
            let _ = writeln!(out, "    .{} = {literal},", attr.name);
        }
        let _ = writeln!(out, "}};");
    }

    if !obj.parameters.is_empty() {
        let _ = writeln!(
            out,
            "static int32_t param_{symbol}[{}] = {{",
            obj.parameters.len()
        );
        for param in &obj.parameters {
            let _ = writeln!(out, "    {}, /* {} */", param.raw(), param.name);
        }
        let _ = writeln!(out, "}};");
    }

    let _ = writeln!(out, "static {ty}_state instance_{symbol};");
    for (k, outlet) in obj.outlets.iter().enumerate() {
        let _ = writeln!(out, "{}", net_decl(outlet.signal, symbol, k));
    }

    let _ = writeln!(out, "static void run_{symbol}(void) {{");
    let mut args = vec![format!("&instance_{symbol}")];
    if !obj.attributes.is_empty() {
        args.push(format!("&attr_{symbol}"));
    }
    if !obj.parameters.is_empty() {
        args.push(format!("param_{symbol}"));
    }
    for (i, inlet) in obj.inlets.iter().enumerate() {
        args.push(inlet_arg(patch, symbols, id, i, inlet.signal));
    }
    for (k, outlet) in obj.outlets.iter().enumerate() {
        let arg = match outlet.signal {
            SignalType::FracBuffer => format!("net_{symbol}_o{k}"),
            _ => format!("&net_{symbol}_o{k}"),
        };
        args.push(arg);
    }
    let _ = writeln!(out, "    {ty}_run({});", args.join(", "));
    let _ = writeln!(out, "}}");
    Ok(out)
}

/// Storage location an inlet reads from: the producing outlet's net buffer,
/// or a neutral constant when the (optional) inlet is unconnected.
fn inlet_arg(
    patch: &Patch,
    symbols: &HashMap<ObjectId, String>,
    id: ObjectId,
    inlet: usize,
    signal: SignalType,
) -> String {
    match patch.net_for_inlet(InletRef { object: id, inlet }) {
        Some(net) => match symbols.get(&net.source.object) {
            Some(producer) => format!("net_{producer}_o{}", net.source.outlet),
            None => "NULL".to_string(),
        },
        None => match signal {
            SignalType::FracBuffer => "NULL".to_string(),
            SignalType::Bool => "false".to_string(),
            SignalType::Frac | SignalType::Int => "0".to_string(),
        },
    }
}

fn net_decl(signal: SignalType, symbol: &str, outlet: usize) -> String {
    match signal {
        SignalType::Frac => format!("static frac_t net_{symbol}_o{outlet};"),
        SignalType::FracBuffer => format!("static frac_t net_{symbol}_o{outlet}[PARCHE_BLOCK];"),
        SignalType::Int => format!("static int32_t net_{symbol}_o{outlet};"),
        SignalType::Bool => format!("static bool net_{symbol}_o{outlet};"),
    }
}

/// Legalize a type name ("osc/sine") into the C prefix its runtime uses.
fn type_symbol(type_name: &str) -> String {
    type_name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

fn assemble(fragments: &[String], run_symbols: &[String], manifest: &Manifest) -> String {
    let mut source = String::new();
    source.push_str("/* Generated by parche. Do not edit. */\n");
    source.push_str("#include \"parche_runtime.h\"\n\n");
    let _ = writeln!(source, "#define PATCH_PARAM_COUNT {}\n", manifest.param_count);

    for fragment in fragments {
        source.push_str(fragment);
        source.push('\n');
    }

    if manifest.param_count > 0 {
        source.push_str("int32_t *const patch_param_table[PATCH_PARAM_COUNT] = {\n");
        for object in &manifest.objects {
            for (i, param) in object.params.iter().enumerate() {
                let _ = writeln!(
                    source,
                    "    &param_{}[{i}], /* {} */",
                    object.symbol, param.index
                );
            }
        }
        source.push_str("};\n\n");
    }

    source.push_str("void patch_run(void) {\n");
    for symbol in run_symbols {
        let _ = writeln!(source, "    run_{symbol}();");
    }
    source.push_str("}\n");
    source
}
