//! Arena builder: карта матча (земля, стены, дома, деревья, платформа)
//!
//! Все объекты: коробки, триангулируются через `Aabb::triangles`.
//! Деревья расставляются seeded ChaCha8: одна и та же карта для одного seed.

use bevy::prelude::*;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::error::SimulationResult;
use crate::math::{flatten, Aabb, Triangle};

use super::level::Level;

pub const ARENA_SIZE: f32 = 60.0;
pub const WALL_HEIGHT: f32 = 4.0;
pub const WALL_THICKNESS: f32 = 1.0;
pub const TREE_COUNT: usize = 20;
pub const TREE_MIN_SPACING: f32 = 3.0;
pub const TREE_PLACEMENT_ATTEMPTS: u32 = 20;
pub const PLAYER_SPAWN: Vec3 = Vec3::new(0.0, 7.0, 0.0);

/// Запас bounds под землёй и над стенами
const BOUNDS_DEPTH: f32 = 10.0;
const BOUNDS_CEILING: f32 = 40.0;

/// Что за коробка (для отладки и для рендера, если понадобится)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArenaObjectKind {
    Wall,
    House,
    Tree,
    Platform,
    Pillar,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArenaObject {
    pub kind: ArenaObjectKind,
    pub center: Vec3,
    pub size: Vec3,
}

impl ArenaObject {
    fn new(kind: ArenaObjectKind, center: Vec3, size: Vec3) -> Self {
        Self { kind, center, size }
    }

    /// Коллизионная коробка. У дерева: только ствол.
    pub fn collision_box(&self) -> Aabb {
        let half = match self.kind {
            ArenaObjectKind::Tree => {
                let trunk = self.size.x.min(self.size.z) * 0.15;
                Vec3::new(trunk, self.size.y * 0.5, trunk)
            }
            _ => self.size * 0.5,
        };
        Aabb::from_center_half_extents(self.center, half)
    }
}

/// Раскладка объектов арены для данного seed
pub fn arena_layout(seed: u64) -> Vec<ArenaObject> {
    let mut objects = Vec::new();
    let half = ARENA_SIZE * 0.5;
    let wall_y = WALL_HEIGHT * 0.5;

    // Периметр
    for z in [half, -half] {
        objects.push(ArenaObject::new(
            ArenaObjectKind::Wall,
            Vec3::new(0.0, wall_y, z),
            Vec3::new(ARENA_SIZE, WALL_HEIGHT, WALL_THICKNESS),
        ));
    }
    for x in [half, -half] {
        objects.push(ArenaObject::new(
            ArenaObjectKind::Wall,
            Vec3::new(x, wall_y, 0.0),
            Vec3::new(WALL_THICKNESS, WALL_HEIGHT, ARENA_SIZE),
        ));
    }

    // Дома
    let houses = [
        (Vec3::new(-15.0, 2.5, -15.0), Vec3::new(8.0, 5.0, 10.0)),
        (Vec3::new(20.0, 2.0, 20.0), Vec3::new(5.0, 4.0, 6.0)),
        (Vec3::new(-20.0, 2.0, 15.0), Vec3::new(4.0, 4.0, 5.0)),
        (Vec3::new(15.0, 3.0, -20.0), Vec3::new(6.0, 6.0, 12.0)),
    ];
    for (center, size) in houses {
        objects.push(ArenaObject::new(ArenaObjectKind::House, center, size));
    }

    // Центральная платформа + колонны
    objects.push(ArenaObject::new(
        ArenaObjectKind::Platform,
        Vec3::new(0.0, 3.5, 0.0),
        Vec3::new(10.0, 1.0, 10.0),
    ));
    for i in 0..4 {
        let angle = (i as f32 * 90.0).to_radians();
        objects.push(ArenaObject::new(
            ArenaObjectKind::Pillar,
            Vec3::new(angle.cos() * 4.5, 2.0, angle.sin() * 4.5),
            Vec3::new(1.0, 4.0, 1.0),
        ));
    }

    // Деревья последними: обходят всё, что уже стоит
    place_trees(&mut objects, seed);

    objects
}

fn place_trees(objects: &mut Vec<ArenaObject>, seed: u64) {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let spread = ARENA_SIZE - 8.0;

    for _ in 0..TREE_COUNT {
        let mut position;
        let mut attempts = 0;
        loop {
            let x = (rng.gen::<f32>() - 0.5) * spread;
            let z = (rng.gen::<f32>() - 0.5) * spread;
            position = Vec3::new(x, 0.0, z);
            attempts += 1;
            let crowded = objects
                .iter()
                .any(|obj| flatten(obj.center).distance(position) < TREE_MIN_SPACING);
            // После лимита попыток дерево ставится как есть
            if !crowded || attempts >= TREE_PLACEMENT_ATTEMPTS {
                break;
            }
        }

        let height = 6.0 + rng.gen::<f32>() * 4.0;
        let width = 0.8 + rng.gen::<f32>() * 0.6;
        objects.push(ArenaObject::new(
            ArenaObjectKind::Tree,
            Vec3::new(position.x, height * 0.5, position.z),
            Vec3::new(width, height, width),
        ));
    }
}

fn ground_quad(half: f32) -> [Triangle; 2] {
    let a = Vec3::new(-half, 0.0, -half);
    let b = Vec3::new(-half, 0.0, half);
    let c = Vec3::new(half, 0.0, half);
    let d = Vec3::new(half, 0.0, -half);
    [Triangle::new(a, b, c), Triangle::new(a, c, d)]
}

fn level_bounds(half: f32) -> Aabb {
    let margin = WALL_THICKNESS;
    Aabb::new(
        Vec3::new(-half - margin, -BOUNDS_DEPTH, -half - margin),
        Vec3::new(half + margin, BOUNDS_CEILING, half + margin),
    )
}

/// Полная арена матча
pub fn build_arena(seed: u64) -> SimulationResult<Level> {
    let half = ARENA_SIZE * 0.5;
    let mut triangles = ground_quad(half).to_vec();
    for object in arena_layout(seed) {
        triangles.extend(object.collision_box().triangles());
    }
    Level::new(triangles, level_bounds(half), PLAYER_SPAWN)
}

/// Только земля (для тестов и бенчмарков). Spawn: над центром.
pub fn build_flat(half_extent: f32) -> SimulationResult<Level> {
    Level::new(
        ground_quad(half_extent).to_vec(),
        level_bounds(half_extent),
        Vec3::new(0.0, 1.0, 0.0),
    )
}
