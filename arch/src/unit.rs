use num_enum::{IntoPrimitive, TryFromPrimitive};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumCount, EnumIter, EnumString, IntoEnumIterator};

/// One tracked piece of machine state.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    IntoPrimitive,
    TryFromPrimitive,
    EnumString,
    EnumIter,
    EnumCount,
    Display,
)]
#[repr(u8)]
pub enum Unit {
    // General purpose registers
    AX,
    BX,
    CX,
    DX,
    SI,
    DI,
    BP,
    SP,

    // Flags
    CF,
    PF,
    AF,
    ZF,
    SF,
    OF,

    // All addressable storage
    MEM,
}

impl Unit {
    pub const REGS: [Unit; 8] = [
        Unit::AX,
        Unit::BX,
        Unit::CX,
        Unit::DX,
        Unit::SI,
        Unit::DI,
        Unit::BP,
        Unit::SP,
    ];

    pub const FLAGS: [Unit; 6] = [Unit::CF, Unit::PF, Unit::AF, Unit::ZF, Unit::SF, Unit::OF];

    pub fn index(self) -> usize {
        u8::from(self) as usize
    }

    pub fn is_reg(self) -> bool {
        self < Unit::CF
    }

    pub fn is_flag(self) -> bool {
        Unit::CF <= self && self <= Unit::OF
    }
}

/// Fixed-length boolean vector indexed by [`Unit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct UnitSet([bool; Unit::COUNT]);

impl UnitSet {
    pub fn none() -> Self {
        UnitSet([false; Unit::COUNT])
    }

    pub fn all() -> Self {
        UnitSet([true; Unit::COUNT])
    }

    pub fn of(units: &[Unit]) -> Self {
        let mut set = UnitSet::none();
        for unit in units {
            set.insert(*unit);
        }
        set
    }

    pub fn get(&self, unit: Unit) -> bool {
        self.0[unit.index()]
    }

    pub fn set(&mut self, unit: Unit, value: bool) {
        self.0[unit.index()] = value;
    }

    pub fn insert(&mut self, unit: Unit) {
        self.set(unit, true);
    }

    pub fn remove(&mut self, unit: Unit) {
        self.set(unit, false);
    }

    pub fn extend(&mut self, other: &UnitSet) {
        for (a, b) in self.0.iter_mut().zip(other.0.iter()) {
            *a |= *b;
        }
    }

    pub fn union(&self, other: &UnitSet) -> UnitSet {
        let mut set = *self;
        set.extend(other);
        set
    }

    pub fn is_subset(&self, other: &UnitSet) -> bool {
        self.0.iter().zip(other.0.iter()).all(|(a, b)| !*a || *b)
    }

    pub fn is_empty(&self) -> bool {
        self.0.iter().all(|b| !*b)
    }

    pub fn len(&self) -> usize {
        self.0.iter().filter(|b| **b).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = Unit> + '_ {
        Unit::iter().filter(move |unit| self.get(*unit))
    }

    pub fn regs(&self) -> Vec<Unit> {
        Unit::REGS.into_iter().filter(|unit| self.get(*unit)).collect()
    }

    pub fn has_all_flags(&self) -> bool {
        Unit::FLAGS.iter().all(|flag| self.get(*flag))
    }
}

impl FromIterator<Unit> for UnitSet {
    fn from_iter<T: IntoIterator<Item = Unit>>(iter: T) -> Self {
        let mut set = UnitSet::none();
        for unit in iter {
            set.insert(unit);
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_kinds() {
        assert!(Unit::REGS.iter().all(|u| u.is_reg() && !u.is_flag()));
        assert!(Unit::FLAGS.iter().all(|u| u.is_flag() && !u.is_reg()));
        assert!(!Unit::MEM.is_reg() && !Unit::MEM.is_flag());
        assert_eq!(Unit::COUNT, 15);
        assert_eq!(Unit::try_from(14u8).ok(), Some(Unit::MEM));
    }

    #[test]
    fn set_operations() {
        let a = UnitSet::of(&[Unit::AX, Unit::ZF]);
        let b = UnitSet::of(&[Unit::AX]);
        assert!(b.is_subset(&a));
        assert!(!a.is_subset(&b));
        assert_eq!(a.union(&UnitSet::of(&[Unit::MEM])).len(), 3);
        assert_eq!(a.regs(), vec![Unit::AX]);
        assert!(UnitSet::all().has_all_flags());
        assert!(UnitSet::none().is_empty());
        assert_eq!(a.iter().collect::<Vec<_>>(), vec![Unit::AX, Unit::ZF]);
    }
}
