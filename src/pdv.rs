// SDPL - a statistical data-processing language interpreter.
// Copyright (C) 2026 The SDPL Project
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, either version 3 of the License, or (at your option) any later
// version.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE.  See the GNU General Public License for more
// details.
//
// You should have received a copy of the GNU General Public License along with
// this program.  If not, see <http://www.gnu.org/licenses/>.

//! Program Data Vector (C5): an ordered symbol table mapping variable name to
//! slot, resolved to slot indices during compilation so the hot per-row loop
//! performs no name lookups.

use bitflags::bitflags;
use indexmap::IndexMap;

use crate::identifier::Identifier;
use crate::value::{Value, DEFAULT_STRING_LEN};

bitflags! {
    /// Per-slot retain/drop/keep state.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct SlotFlags: u8 {
        const RETAINED = 0b001;
        const DROPPED  = 0b010;
        const KEPT     = 0b100;
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VarType {
    Numeric,
    Character,
}

#[derive(Clone, Debug)]
pub struct PdvSlot {
    pub name: Identifier,
    pub var_type: VarType,
    /// Declared string length; unused for numeric slots.
    pub len: usize,
    pub value: Value,
    pub flags: SlotFlags,
    /// Retained variables keep a separately-tracked initial/retained value
    /// that survives the reset-for-next-iteration step.
    pub retained_value: Option<Value>,
}

impl PdvSlot {
    fn reset_for_iteration(&mut self) {
        if self.flags.contains(SlotFlags::RETAINED) {
            if let Some(retained) = &self.retained_value {
                self.value = retained.clone();
            }
            return;
        }
        self.value = match self.var_type {
            VarType::Numeric => Value::missing(),
            VarType::Character => Value::blank(self.len),
        };
    }
}

/// Error raised when the compile pass or evaluator encounters a PDV
/// inconsistency.
#[derive(Clone, Debug, thiserror::Error, PartialEq, Eq)]
pub enum PdvError {
    #[error("variable {0} was first used as {1:?} and cannot be reassigned as a different type")]
    TypeConflict(String, VarType),
    #[error("array index {0} is out of range for array {1} of size {2}")]
    ArrayOutOfRange(f64, String, usize),
    #[error("unknown variable {0}")]
    UnknownVariable(String),
}

/// The Program Data Vector: an ordered name -> slot table.
#[derive(Clone, Debug, Default)]
pub struct Pdv {
    slots: IndexMap<Identifier, PdvSlot>,
}

impl Pdv {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn slot_index(&self, name: &Identifier) -> Option<usize> {
        self.slots.get_index_of(name)
    }

    pub fn get(&self, name: &Identifier) -> Option<&PdvSlot> {
        self.slots.get(name)
    }

    pub fn get_by_index(&self, index: usize) -> Option<&PdvSlot> {
        self.slots.get_index(index).map(|(_, slot)| slot)
    }

    pub fn get_by_index_mut(&mut self, index: usize) -> Option<&mut PdvSlot> {
        self.slots.get_index_mut(index).map(|(_, slot)| slot)
    }

    /// Declares `name` if not already present, fixing its type on first
    /// assignment. Returns the slot index.
    pub fn declare(
        &mut self,
        name: &Identifier,
        var_type: VarType,
        len: usize,
    ) -> Result<usize, PdvError> {
        if let Some((index, _, slot)) = self.slots.get_full(name) {
            if slot.var_type != var_type {
                return Err(PdvError::TypeConflict(name.to_string(), slot.var_type));
            }
            return Ok(index);
        }
        let value = match var_type {
            VarType::Numeric => Value::missing(),
            VarType::Character => Value::blank(len),
        };
        let slot = PdvSlot {
            name: name.clone(),
            var_type,
            len,
            value,
            flags: SlotFlags::KEPT,
            retained_value: None,
        };
        self.slots.insert(name.clone(), slot);
        Ok(self.slots.len() - 1)
    }

    pub fn declare_numeric(&mut self, name: &Identifier) -> Result<usize, PdvError> {
        self.declare(name, VarType::Numeric, 0)
    }

    pub fn declare_string(&mut self, name: &Identifier, len: usize) -> Result<usize, PdvError> {
        self.declare(name, VarType::Character, len)
    }

    /// Marks `name` as retained, setting its initial value.
    pub fn retain(&mut self, name: &Identifier, initial: Value) -> Result<(), PdvError> {
        let var_type = match &initial {
            Value::Number(_) => VarType::Numeric,
            Value::String(_) => VarType::Character,
        };
        let len = match &initial {
            Value::String(s) => s.len(),
            Value::Number(_) => 0,
        };
        self.declare(name, var_type, len)?;
        let slot = self.slots.get_mut(name).unwrap();
        slot.flags.insert(SlotFlags::RETAINED);
        slot.retained_value = Some(initial.clone());
        slot.value = initial;
        Ok(())
    }

    pub fn set_dropped(&mut self, name: &Identifier) -> Result<(), PdvError> {
        let slot = self
            .slots
            .get_mut(name)
            .ok_or_else(|| PdvError::UnknownVariable(name.to_string()))?;
        slot.flags.insert(SlotFlags::DROPPED);
        Ok(())
    }

    /// If both DROP and KEEP mention `v`, KEEP wins. Callers apply
    /// `set_dropped` for every DROP name and
    /// `set_kept_exclusive` for every KEEP name *after* all drops are
    /// applied, then `set_kept_exclusive` clears the dropped flag for the
    /// names it names.
    pub fn set_kept_exclusive(&mut self, name: &Identifier) -> Result<(), PdvError> {
        let slot = self
            .slots
            .get_mut(name)
            .ok_or_else(|| PdvError::UnknownVariable(name.to_string()))?;
        slot.flags.remove(SlotFlags::DROPPED);
        slot.flags.insert(SlotFlags::KEPT);
        Ok(())
    }

    /// Restricts the output column set to exactly `names`, dropping every
    /// other kept variable. Used when a `KEEP` statement is present: `KEEP`
    /// without a matching `DROP` still restricts output to the kept set.
    pub fn restrict_to_keep_list(&mut self, names: &[Identifier]) {
        for (existing_name, slot) in self.slots.iter_mut() {
            if names.contains(existing_name) {
                slot.flags.remove(SlotFlags::DROPPED);
                slot.flags.insert(SlotFlags::KEPT);
            } else {
                slot.flags.remove(SlotFlags::KEPT);
            }
        }
    }

    pub fn set_value(&mut self, index: usize, value: Value) {
        if let Some((_, slot)) = self.slots.get_index_mut(index) {
            slot.value = value;
            if slot.flags.contains(SlotFlags::RETAINED) {
                slot.retained_value = Some(slot.value.clone());
            }
        }
    }

    /// Resets every non-retained variable at the top of a new iteration.
    pub fn reset_for_iteration(&mut self) {
        for slot in self.slots.values_mut() {
            slot.reset_for_iteration();
        }
    }

    /// Column order = PDV insertion order restricted to kept, non-dropped
    /// variables.
    pub fn output_columns(&self) -> Vec<&Identifier> {
        self.slots
            .values()
            .filter(|slot| slot.flags.contains(SlotFlags::KEPT) && !slot.flags.contains(SlotFlags::DROPPED))
            .map(|slot| &slot.name)
            .collect()
    }

    /// Snapshots the current PDV state into a [Row] containing only the kept
    /// columns.
    pub fn snapshot(&self) -> Row {
        let cells = self
            .slots
            .values()
            .filter(|slot| slot.flags.contains(SlotFlags::KEPT) && !slot.flags.contains(SlotFlags::DROPPED))
            .map(|slot| (slot.name.clone(), slot.value.clone()))
            .collect();
        Row { cells }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Identifier, &PdvSlot)> {
        self.slots.iter()
    }
}

/// One materialized row: exactly the PDV's kept columns at OUTPUT time.
#[derive(Clone, Debug, Default)]
pub struct Row {
    cells: Vec<(Identifier, Value)>,
}

impl Row {
    pub fn new(cells: Vec<(Identifier, Value)>) -> Self {
        Self { cells }
    }

    pub fn get(&self, name: &Identifier) -> Option<&Value> {
        self.cells.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn columns(&self) -> impl Iterator<Item = &Identifier> {
        self.cells.iter().map(|(n, _)| n)
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.cells.iter().map(|(_, v)| v)
    }

    pub fn cells(&self) -> &[(Identifier, Value)] {
        &self.cells
    }

    /// Appends a cell for `name` holding `value`, unless the row already has
    /// one. Used to backfill a column declared after this row was emitted.
    pub fn fill_missing(&mut self, name: Identifier, value: Value) {
        if self.get(&name).is_none() {
            self.cells.push((name, value));
        }
    }

    /// Row equality: same column set and per-column values
    /// equal (using [Value::row_eq]'s epsilon/trim rules).
    pub fn row_eq(&self, other: &Row, epsilon: f64) -> bool {
        if self.cells.len() != other.cells.len() {
            return false;
        }
        self.cells.iter().all(|(name, value)| {
            other
                .get(name)
                .is_some_and(|other_value| value.row_eq(other_value, epsilon))
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ColumnDef {
    pub name_is_placeholder: bool,
}

/// A published dataset: ordered columns plus rows.
#[derive(Clone, Debug, Default)]
pub struct Dataset {
    pub name: String,
    pub columns: Vec<(Identifier, VarType, usize)>,
    pub rows: Vec<Row>,
}

impl Dataset {
    pub fn new(name: impl Into<String>, columns: Vec<(Identifier, VarType, usize)>) -> Self {
        Self {
            name: name.into(),
            columns,
            rows: Vec::new(),
        }
    }

    pub fn column_names(&self) -> Vec<&Identifier> {
        self.columns.iter().map(|(name, ..)| name).collect()
    }
}
