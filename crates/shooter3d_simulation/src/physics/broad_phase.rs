//! Broad phase: uniform spatial grid
//!
//! Ячейки хранятся в `BTreeMap` по целочисленным координатам: порядок
//! обхода не зависит от hash seed, candidate pairs отсортированы.
//! Используется и для dynamic entities (ключ `EntityId`), и для
//! треугольников уровня (ключ: индекс треугольника).

use std::collections::{BTreeMap, BTreeSet};

use bevy::prelude::*;

use crate::math::Aabb;

/// Ячейки на одну ось, больше которых AABB считается "огромной"
const MAX_CELLS_PER_AXIS: i32 = 256;

type CellKey = (i32, i32, i32);

#[derive(Debug, Clone)]
pub struct UniformGrid<K: Ord + Copy> {
    cell_size: f32,
    cells: BTreeMap<CellKey, Vec<K>>,
}

impl<K: Ord + Copy> UniformGrid<K> {
    pub fn new(cell_size: f32) -> Self {
        Self {
            cell_size: cell_size.max(0.01),
            cells: BTreeMap::new(),
        }
    }

    fn cell_of(&self, point: Vec3) -> CellKey {
        let scaled = (point / self.cell_size).floor();
        (scaled.x as i32, scaled.y as i32, scaled.z as i32)
    }

    fn cell_range(&self, aabb: &Aabb) -> (CellKey, CellKey) {
        let lo = self.cell_of(aabb.min);
        let hi = self.cell_of(aabb.max);
        // Clamp: мусорные AABB (NaN, бесконечность) не должны зависать на обходе
        let clamp = |lo: i32, hi: i32| (lo, hi.min(lo.saturating_add(MAX_CELLS_PER_AXIS)));
        let (x0, x1) = clamp(lo.0, hi.0);
        let (y0, y1) = clamp(lo.1, hi.1);
        let (z0, z1) = clamp(lo.2, hi.2);
        ((x0, y0, z0), (x1, y1, z1))
    }

    pub fn insert(&mut self, key: K, aabb: &Aabb) {
        let ((x0, y0, z0), (x1, y1, z1)) = self.cell_range(aabb);
        for x in x0..=x1 {
            for y in y0..=y1 {
                for z in z0..=z1 {
                    self.cells.entry((x, y, z)).or_default().push(key);
                }
            }
        }
    }

    /// Все ключи в ячейках, которые задевает `aabb` (отсортированы, без дублей)
    pub fn query(&self, aabb: &Aabb) -> Vec<K> {
        let ((x0, y0, z0), (x1, y1, z1)) = self.cell_range(aabb);
        // range по tuple лексикографический: захватывает лишние y/z, фильтруем
        let mut found = BTreeSet::new();
        for ((_, y, z), keys) in self.cells.range((x0, y0, z0)..=(x1, y1, z1)) {
            if (y0..=y1).contains(y) && (z0..=z1).contains(z) {
                found.extend(keys.iter().copied());
            }
        }
        found.into_iter().collect()
    }

    /// Пары ключей, делящих хотя бы одну ячейку: (меньший, больший), sorted
    pub fn candidate_pairs(&self) -> Vec<(K, K)> {
        let mut pairs = BTreeSet::new();
        for keys in self.cells.values() {
            for (i, a) in keys.iter().enumerate() {
                for b in &keys[i + 1..] {
                    if a == b {
                        continue;
                    }
                    pairs.insert(if a < b { (*a, *b) } else { (*b, *a) });
                }
            }
        }
        pairs.into_iter().collect()
    }
}
