use arch::{Instruction, Unit, UnitSet};
use masm::Program;
use rand::rngs::StdRng;
use rand::Rng;
use std::collections::VecDeque;
use tracing::debug;

use crate::error::{Error, Result};
use crate::technique::Technique;

/// Reorders each process at random while keeping, for every unit, the order
/// between reads and writes of that unit.
pub struct Permuter;

/// Set of indices with O(1) insert, remove and uniform pick.
#[derive(Debug, Default)]
pub struct RandomSet {
    items: Vec<usize>,
    slots: Vec<Option<usize>>,
}

impl RandomSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn contains(&self, item: usize) -> bool {
        matches!(self.slots.get(item), Some(Some(_)))
    }

    pub fn insert(&mut self, item: usize) -> bool {
        if self.contains(item) {
            return false;
        }
        if self.slots.len() <= item {
            self.slots.resize(item + 1, None);
        }
        self.slots[item] = Some(self.items.len());
        self.items.push(item);
        true
    }

    pub fn remove(&mut self, item: usize) -> bool {
        let Some(Some(slot)) = self.slots.get(item).copied() else {
            return false;
        };
        self.slots[item] = None;
        self.items.swap_remove(slot);
        if let Some(&moved) = self.items.get(slot) {
            self.slots[moved] = Some(slot);
        }
        true
    }

    /// Remove and return a uniformly chosen item.
    pub fn pick(&mut self, rng: &mut impl Rng) -> Option<usize> {
        if self.items.is_empty() {
            return None;
        }
        let item = self.items[rng.gen_range(0..self.items.len())];
        self.remove(item);
        Some(item)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Access {
    Use,
    Change,
    Both,
}

/// Instruction indices referencing `unit`, grouped into chunks that must run in order.
/// Members of one chunk may run in any order among themselves.
pub fn chunks(body: &[Instruction], unit: Unit) -> Vec<Vec<usize>> {
    let refs: Vec<(usize, Access)> = body
        .iter()
        .enumerate()
        .filter_map(|(i, inst)| {
            match (inst.uses().get(unit), inst.changes().get(unit)) {
                (true, true) => Some((i, Access::Both)),
                (true, false) => Some((i, Access::Use)),
                (false, true) => Some((i, Access::Change)),
                (false, false) => None,
            }
        })
        .collect();

    let mut chunks = vec![];
    let mut i = 0;
    while i < refs.len() {
        let start = i;
        match refs[i].1 {
            Access::Both => i += 1,
            // Stores may alias, so they never share a chunk.
            Access::Change if unit == Unit::MEM => i += 1,
            access => {
                while i < refs.len() && refs[i].1 == access {
                    i += 1;
                }
            }
        }
        let run: Vec<usize> = refs[start..i].iter().map(|(idx, _)| *idx).collect();
        match (refs[start].1, run.split_last()) {
            // The write that survives into the following reads stays last.
            (Access::Change, Some((last, rest))) if !rest.is_empty() => {
                chunks.push(rest.to_vec());
                chunks.push(vec![*last]);
            }
            _ => chunks.push(run),
        }
    }
    chunks
}

struct Chunk {
    members: Vec<usize>,
    left: usize,
}

/// A random emission order of `body` respecting every unit's chunk order.
/// `None` if the constraints stop making progress.
pub fn schedule(body: &[Instruction], rng: &mut StdRng) -> Option<Vec<usize>> {
    let mut blocked = vec![0usize; body.len()];
    let mut queues: Vec<VecDeque<Chunk>> = vec![];
    for unit in UnitSet::all().iter() {
        let queue: VecDeque<Chunk> = chunks(body, unit)
            .into_iter()
            .map(|members| Chunk {
                left: members.len(),
                members,
            })
            .collect();
        for chunk in queue.iter().skip(1) {
            for &i in &chunk.members {
                blocked[i] += 1;
            }
        }
        queues.push(queue);
    }

    let mut ready = RandomSet::new();
    for (i, count) in blocked.iter().enumerate() {
        if *count == 0 {
            ready.insert(i);
        }
    }

    let mut order = Vec::with_capacity(body.len());
    while let Some(i) = ready.pick(rng) {
        order.push(i);
        for unit in body[i].includes().iter() {
            let queue = &mut queues[unit.index()];
            let Some(front) = queue.front_mut() else {
                continue;
            };
            front.left -= 1;
            if front.left > 0 {
                continue;
            }
            queue.pop_front();
            if let Some(next) = queue.front() {
                for &j in &next.members {
                    blocked[j] -= 1;
                    if blocked[j] == 0 {
                        ready.insert(j);
                    }
                }
            }
        }
    }
    (order.len() == body.len()).then_some(order)
}

impl Permuter {
    pub fn permute(&self, program: &Program, rng: &mut StdRng) -> Result<Program> {
        program.try_map_processes(|name, body| {
            let order = schedule(body, rng)
                .ok_or_else(|| Error::Stalled(name.to_string(), body.len()))?;
            let moved = order.iter().enumerate().filter(|(pos, i)| pos != *i).count();
            debug!(process = name, moved, "permuted");
            Ok(order.into_iter().map(|i| body[i].clone()).collect())
        })
    }
}

impl Technique for Permuter {
    fn name(&self) -> &'static str {
        "permute"
    }

    fn apply(&self, program: &Program, rng: &mut StdRng) -> Result<Program> {
        self.permute(program, rng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn body(lines: &[&str]) -> Vec<Instruction> {
        lines.iter().map(|line| Instruction::parse(line)).collect()
    }

    #[test]
    fn random_set() {
        let mut set = RandomSet::new();
        assert!(set.insert(3));
        assert!(set.insert(0));
        assert!(set.insert(7));
        assert!(!set.insert(3));
        assert!(set.remove(3));
        assert!(!set.remove(3));
        assert!(set.contains(7) && set.contains(0) && !set.contains(3));
        assert_eq!(set.len(), 2);

        let mut rng = StdRng::seed_from_u64(1);
        let mut seen = vec![set.pick(&mut rng).unwrap(), set.pick(&mut rng).unwrap()];
        seen.sort();
        assert_eq!(seen, [0, 7]);
        assert!(set.is_empty());
        assert_eq!(set.pick(&mut rng), None);
    }

    #[test]
    fn chunking() {
        let code = body(&[
            "mov eax, 1",   // 0 change
            "mov eax, 2",   // 1 change
            "mov ebx, eax", // 2 use
            "mov ecx, eax", // 3 use
            "add eax, 1",   // 4 both
            "push eax",     // 5 use
        ]);
        assert_eq!(chunks(&code, Unit::AX), vec![vec![0], vec![1], vec![2, 3], vec![4], vec![5]]);
        assert_eq!(chunks(&code, Unit::BX), vec![vec![2]]);
        assert_eq!(chunks(&code, Unit::DI), Vec::<Vec<usize>>::new());
    }

    #[test]
    fn change_runs_merge() {
        let code = body(&["mov eax, 1", "mov eax, 2", "mov eax, 3", "push eax"]);
        assert_eq!(chunks(&code, Unit::AX), vec![vec![0, 1], vec![2], vec![3]]);
    }

    #[test]
    fn stores_keep_their_order() {
        let code = body(&[
            "mov DWORD PTR [eax], 1",
            "mov DWORD PTR [ebx], 2",
            "mov DWORD PTR [eax], 3",
            "mov ecx, DWORD PTR [eax]",
        ]);
        assert_eq!(chunks(&code, Unit::MEM), vec![vec![0], vec![1], vec![2], vec![3]]);
    }

    #[test]
    fn labels_pin_everything() {
        let code = body(&["mov eax, 1", "mov ebx, 2", "$L1:", "mov ecx, 3", "mov edx, 4"]);
        for seed in 0..32 {
            let order = schedule(&code, &mut StdRng::seed_from_u64(seed)).unwrap();
            assert_eq!(order[2], 2);
        }
    }
}
