//! The patch aggregate: an arena of object instances plus the nets wiring them.
//!
//! Instances live in patch-owned slots addressed by [`ObjectId`]; removal
//! tombstones the slot (ids are never reused) and cascades net cleanup by
//! index lookup. A single dirty flag is set by any mutation and cleared only
//! by [`Patch::mark_clean`] after a successful regenerate+deploy or an
//! explicit save. Dirty transitions surface as explicit [`PatchEvent`]s the
//! editor collaborator drains via [`Patch::poll_events`].

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::attribute::AttributeValue;
use crate::error::ModelError;
use crate::net::{InletRef, Net, OutletRef};
use crate::object::ObjectInstance;

/// Stable identifier of an object slot within a patch.
///
/// Slot indices are assigned in authoring order and never reused; this order
/// breaks ties in the resolver so generated code stays diffable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId(pub(crate) u32);

impl ObjectId {
    /// Returns the raw slot index.
    #[inline]
    pub fn index(self) -> u32 {
        self.0
    }
}

impl core::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "ObjectId({})", self.0)
    }
}

/// Events the patch emits towards the editor collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchEvent {
    /// The single dirty flag changed state.
    DirtyChanged(bool),
}

/// The root aggregate: object instances and nets.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Patch {
    /// Instance slots in authoring order. `None` marks a tombstoned slot.
    slots: Vec<Option<ObjectInstance>>,
    /// Nets referencing slots by index.
    nets: Vec<Net>,
    /// Set by any mutation, cleared only by `mark_clean`.
    #[serde(skip)]
    dirty: bool,
    /// Pending events for the editor collaborator.
    #[serde(skip)]
    events: Vec<PatchEvent>,
}

impl Patch {
    /// Create an empty patch.
    pub fn new() -> Self {
        Self::default()
    }

    // --- queries ---

    /// Whether any mutation happened since the last `mark_clean`.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Live instances, in authoring order.
    pub fn objects(&self) -> impl Iterator<Item = (ObjectId, &ObjectInstance)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|obj| (ObjectId(i as u32), obj)))
    }

    /// Number of live instances.
    pub fn object_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// Look up a live instance.
    pub fn object(&self, id: ObjectId) -> Option<&ObjectInstance> {
        self.slots.get(id.0 as usize).and_then(Option::as_ref)
    }

    /// Find a live instance by its patch-unique name.
    pub fn find(&self, name: &str) -> Option<ObjectId> {
        self.objects()
            .find(|(_, obj)| obj.name == name)
            .map(|(id, _)| id)
    }

    /// All nets.
    pub fn nets(&self) -> &[Net] {
        &self.nets
    }

    /// The net feeding the given inlet, if any.
    pub fn net_for_inlet(&self, inlet: InletRef) -> Option<&Net> {
        self.nets.iter().find(|n| n.feeds(inlet))
    }

    /// Drain pending events.
    pub fn poll_events(&mut self) -> Vec<PatchEvent> {
        core::mem::take(&mut self.events)
    }

    // --- mutations ---

    /// Add an instance to a fresh slot.
    ///
    /// Fails with [`ModelError::DuplicateName`] if the name is taken.
    pub fn add_instance(&mut self, instance: ObjectInstance) -> Result<ObjectId, ModelError> {
        if self.find(&instance.name).is_some() {
            return Err(ModelError::DuplicateName(instance.name));
        }
        let id = ObjectId(self.slots.len() as u32);
        debug!(object = %instance.name, %id, "add instance");
        self.slots.push(Some(instance));
        self.mark_dirty();
        Ok(id)
    }

    /// Remove an instance, tombstoning its slot.
    ///
    /// Cascades: every net sourced at the instance is removed, and the
    /// instance's inlets are detached from the nets feeding them.
    pub fn remove_instance(&mut self, id: ObjectId) -> Result<ObjectInstance, ModelError> {
        let slot = self
            .slots
            .get_mut(id.0 as usize)
            .ok_or_else(|| ModelError::UnknownObject(id.to_string()))?;
        let instance = slot
            .take()
            .ok_or_else(|| ModelError::UnknownObject(id.to_string()))?;
        self.nets.retain_mut(|net| {
            if net.source.object == id {
                return false;
            }
            net.sinks.retain(|s| s.object != id);
            !net.sinks.is_empty()
        });
        debug!(object = %instance.name, %id, "remove instance");
        self.mark_dirty();
        Ok(instance)
    }

    /// Rename a live instance, keeping names patch-unique.
    pub fn rename_instance(&mut self, id: ObjectId, name: &str) -> Result<(), ModelError> {
        if let Some(existing) = self.find(name)
            && existing != id
        {
            return Err(ModelError::DuplicateName(name.to_string()));
        }
        let obj = self.object_mut(id)?;
        obj.name = name.to_string();
        self.mark_dirty();
        Ok(())
    }

    /// Connect an outlet to an inlet.
    ///
    /// Fan-out joins the existing net of that outlet; otherwise a new net is
    /// created. Fails on signal incompatibility or an already-occupied inlet.
    pub fn connect(&mut self, source: OutletRef, sink: InletRef) -> Result<(), ModelError> {
        let out_signal = {
            let obj = self.object_checked(source.object)?;
            obj.outlets
                .get(source.outlet)
                .ok_or_else(|| ModelError::UnknownIolet {
                    object: obj.name.clone(),
                    direction: "outlet",
                    iolet: source.outlet,
                })?
                .signal
        };
        let (in_signal, sink_names) = {
            let obj = self.object_checked(sink.object)?;
            let inlet = obj
                .inlets
                .get(sink.inlet)
                .ok_or_else(|| ModelError::UnknownIolet {
                    object: obj.name.clone(),
                    direction: "inlet",
                    iolet: sink.inlet,
                })?;
            (inlet.signal, (obj.name.clone(), inlet.name.clone()))
        };

        if !out_signal.is_compatible(in_signal) {
            return Err(ModelError::SignalMismatch {
                from: out_signal.name(),
                to: in_signal.name(),
            });
        }
        if self.net_for_inlet(sink).is_some() {
            return Err(ModelError::InletOccupied {
                object: sink_names.0,
                inlet: sink_names.1,
            });
        }

        if let Some(net) = self.nets.iter_mut().find(|n| n.source == source) {
            net.sinks.push(sink);
        } else {
            self.nets.push(Net {
                source,
                sinks: vec![sink],
                signal: out_signal,
            });
        }
        self.mark_dirty();
        Ok(())
    }

    /// Detach an inlet from the net feeding it.
    ///
    /// The net is removed entirely when its last sink disconnects.
    pub fn disconnect_inlet(&mut self, sink: InletRef) -> Result<(), ModelError> {
        let Some(pos) = self.nets.iter().position(|n| n.feeds(sink)) else {
            let obj = self.object_checked(sink.object)?;
            let inlet = obj
                .inlets
                .get(sink.inlet)
                .map_or_else(|| format!("#{}", sink.inlet), |i| i.name.clone());
            return Err(ModelError::NotConnected {
                object: obj.name.clone(),
                inlet,
            });
        };
        let net = &mut self.nets[pos];
        net.sinks.retain(|s| *s != sink);
        if net.sinks.is_empty() {
            self.nets.swap_remove(pos);
        }
        self.mark_dirty();
        Ok(())
    }

    /// Validate and assign an attribute value on a live instance.
    pub fn set_attribute_value(
        &mut self,
        id: ObjectId,
        attribute: &str,
        value: AttributeValue,
    ) -> Result<(), ModelError> {
        let obj = self.object_mut(id)?;
        let name = obj.name.clone();
        let attr = obj
            .attribute_mut(attribute)
            .ok_or_else(|| ModelError::UnknownAttribute {
                object: name,
                attribute: attribute.to_string(),
            })?;
        attr.set_value(value)?;
        self.mark_dirty();
        Ok(())
    }

    /// Set a parameter's raw value on a live instance (marks it for transmit).
    pub fn set_parameter_raw(
        &mut self,
        id: ObjectId,
        parameter: &str,
        raw: i32,
    ) -> Result<(), ModelError> {
        let obj = self.object_mut(id)?;
        let name = obj.name.clone();
        let param = obj
            .parameter_mut(parameter)
            .ok_or_else(|| ModelError::UnknownParameter {
                object: name,
                parameter: parameter.to_string(),
            })?;
        param.set_raw(raw);
        self.mark_dirty();
        Ok(())
    }

    /// Freeze or unfreeze a parameter (frozen = exempt from randomization).
    pub fn set_parameter_frozen(
        &mut self,
        id: ObjectId,
        parameter: &str,
        frozen: bool,
    ) -> Result<(), ModelError> {
        let obj = self.object_mut(id)?;
        let name = obj.name.clone();
        let param = obj
            .parameter_mut(parameter)
            .ok_or_else(|| ModelError::UnknownParameter {
                object: name,
                parameter: parameter.to_string(),
            })?;
        param.frozen = frozen;
        self.mark_dirty();
        Ok(())
    }

    /// Bulk-randomize every unfrozen parameter in the patch.
    ///
    /// Returns the number of parameters that changed.
    pub fn randomize_parameters<R: Rng>(&mut self, rng: &mut R) -> usize {
        let mut changed = 0;
        for slot in self.slots.iter_mut().flatten() {
            for param in &mut slot.parameters {
                if param.randomize(rng) {
                    changed += 1;
                }
            }
        }
        if changed > 0 {
            self.mark_dirty();
        }
        changed
    }

    /// Clear the dirty flag after a successful regenerate+deploy or save.
    pub fn mark_clean(&mut self) {
        if self.dirty {
            self.dirty = false;
            self.events.push(PatchEvent::DirtyChanged(false));
        }
    }

    // --- internals ---

    fn mark_dirty(&mut self) {
        if !self.dirty {
            self.dirty = true;
            self.events.push(PatchEvent::DirtyChanged(true));
        }
    }

    fn object_checked(&self, id: ObjectId) -> Result<&ObjectInstance, ModelError> {
        self.object(id)
            .ok_or_else(|| ModelError::UnknownObject(id.to_string()))
    }

    fn object_mut(&mut self, id: ObjectId) -> Result<&mut ObjectInstance, ModelError> {
        self.slots
            .get_mut(id.0 as usize)
            .and_then(Option::as_mut)
            .ok_or_else(|| ModelError::UnknownObject(id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::ObjectLibrary;

    fn patch_with(names: &[(&str, &str)]) -> (Patch, Vec<ObjectId>) {
        let lib = ObjectLibrary::with_builtins();
        let mut patch = Patch::new();
        let ids = names
            .iter()
            .map(|(ty, name)| {
                patch
                    .add_instance(lib.instantiate(ty, *name).unwrap())
                    .unwrap()
            })
            .collect();
        (patch, ids)
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let lib = ObjectLibrary::with_builtins();
        let mut patch = Patch::new();
        patch
            .add_instance(lib.instantiate("osc/sine", "Osc 1").unwrap())
            .unwrap();
        let err = patch
            .add_instance(lib.instantiate("osc/sine", "Osc 1").unwrap())
            .unwrap_err();
        assert!(matches!(err, ModelError::DuplicateName(_)));
    }

    #[test]
    fn connect_checks_signal_compatibility() {
        let (mut patch, ids) = patch_with(&[("ctrl/dial", "Dial 1"), ("io/dac", "Out")]);
        // ctrl/dial emits Frac; io/dac expects FracBuffer.
        let err = patch
            .connect(
                OutletRef {
                    object: ids[0],
                    outlet: 0,
                },
                InletRef {
                    object: ids[1],
                    inlet: 0,
                },
            )
            .unwrap_err();
        assert!(matches!(err, ModelError::SignalMismatch { .. }));
    }

    #[test]
    fn inlet_accepts_at_most_one_net() {
        let (mut patch, ids) =
            patch_with(&[("osc/sine", "Osc 1"), ("osc/sine", "Osc 2"), ("io/dac", "Out")]);
        let sink = InletRef {
            object: ids[2],
            inlet: 0,
        };
        patch
            .connect(
                OutletRef {
                    object: ids[0],
                    outlet: 0,
                },
                sink,
            )
            .unwrap();
        let err = patch
            .connect(
                OutletRef {
                    object: ids[1],
                    outlet: 0,
                },
                sink,
            )
            .unwrap_err();
        assert!(matches!(err, ModelError::InletOccupied { .. }));
    }

    #[test]
    fn outlet_fans_out_into_one_net() {
        let (mut patch, ids) = patch_with(&[
            ("osc/sine", "Osc 1"),
            ("mix/gain", "Gain 1"),
            ("mix/gain", "Gain 2"),
        ]);
        let source = OutletRef {
            object: ids[0],
            outlet: 0,
        };
        for sink_id in &ids[1..] {
            patch
                .connect(
                    source,
                    InletRef {
                        object: *sink_id,
                        inlet: 0,
                    },
                )
                .unwrap();
        }
        assert_eq!(patch.nets().len(), 1);
        assert_eq!(patch.nets()[0].sinks.len(), 2);
    }

    #[test]
    fn remove_instance_cascades_nets() {
        let (mut patch, ids) = patch_with(&[("osc/sine", "Osc 1"), ("io/dac", "Out")]);
        patch
            .connect(
                OutletRef {
                    object: ids[0],
                    outlet: 0,
                },
                InletRef {
                    object: ids[1],
                    inlet: 0,
                },
            )
            .unwrap();
        assert_eq!(patch.nets().len(), 1);
        patch.remove_instance(ids[0]).unwrap();
        assert!(patch.nets().is_empty(), "net must die with its source");
        assert!(patch.object(ids[0]).is_none(), "slot is tombstoned");
        assert_eq!(patch.object_count(), 1);
    }

    #[test]
    fn disconnect_last_sink_removes_net() {
        let (mut patch, ids) = patch_with(&[("osc/sine", "Osc 1"), ("io/dac", "Out")]);
        let sink = InletRef {
            object: ids[1],
            inlet: 0,
        };
        patch
            .connect(
                OutletRef {
                    object: ids[0],
                    outlet: 0,
                },
                sink,
            )
            .unwrap();
        patch.disconnect_inlet(sink).unwrap();
        assert!(patch.nets().is_empty());
        assert!(matches!(
            patch.disconnect_inlet(sink),
            Err(ModelError::NotConnected { .. })
        ));
    }

    #[test]
    fn dirty_transitions_emit_exactly_one_event() {
        let (mut patch, ids) = patch_with(&[("osc/sine", "Osc 1")]);
        // patch_with already dirtied it once via add_instance.
        let events = patch.poll_events();
        assert_eq!(events, vec![PatchEvent::DirtyChanged(true)]);

        // Further mutations while dirty emit nothing new.
        patch.set_parameter_raw(ids[0], "freq", 1234).unwrap();
        assert!(patch.poll_events().is_empty());

        patch.mark_clean();
        assert_eq!(patch.poll_events(), vec![PatchEvent::DirtyChanged(false)]);
    }

    #[test]
    fn randomize_respects_frozen_flag() {
        use rand::SeedableRng;
        let (mut patch, ids) = patch_with(&[("osc/sine", "Osc 1")]);
        patch.set_parameter_frozen(ids[0], "freq", true).unwrap();
        let before = patch.object(ids[0]).unwrap().parameter("freq").unwrap().raw();
        let mut rng = rand::rngs::StdRng::seed_from_u64(3);
        patch.randomize_parameters(&mut rng);
        let after = patch.object(ids[0]).unwrap().parameter("freq").unwrap().raw();
        assert_eq!(before, after);
    }
}
