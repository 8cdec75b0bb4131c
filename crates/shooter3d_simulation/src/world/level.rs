//! Static level geometry: triangle soup + bounds + spawn
//!
//! Строится один раз в Loading, дальше только читается (Res<Level>).

use bevy::prelude::*;

use crate::error::{SimulationError, SimulationResult};
use crate::math::{ray_triangle, Aabb, Ray, Triangle};
use crate::physics::broad_phase::UniformGrid;

/// Размер ячейки grid для треугольников уровня (метры)
pub const LEVEL_CELL_SIZE: f32 = 4.0;

/// Ближе этого к цели попадание не считается перекрытием LOS
const LOS_TOLERANCE: f32 = 1e-3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    pub distance: f32,
    pub point: Vec3,
    pub normal: Vec3,
    pub triangle: usize,
}

#[derive(Resource, Debug, Clone)]
pub struct Level {
    triangles: Vec<Triangle>,
    bounds: Aabb,
    player_spawn: Vec3,
    grid: UniformGrid<usize>,
}

impl Level {
    /// Валидирует геометрию и строит grid
    pub fn new(triangles: Vec<Triangle>, bounds: Aabb, player_spawn: Vec3) -> SimulationResult<Self> {
        validate_geometry(&triangles, &bounds, player_spawn)?;

        let mut grid = UniformGrid::new(LEVEL_CELL_SIZE);
        for (index, tri) in triangles.iter().enumerate() {
            grid.insert(index, &tri.aabb());
        }

        Ok(Self {
            triangles,
            bounds,
            player_spawn,
            grid,
        })
    }

    pub fn triangles(&self) -> &[Triangle] {
        &self.triangles
    }

    pub fn triangle(&self, index: usize) -> Option<&Triangle> {
        self.triangles.get(index)
    }

    pub fn bounds(&self) -> &Aabb {
        &self.bounds
    }

    pub fn player_spawn(&self) -> Vec3 {
        self.player_spawn
    }

    pub fn contains(&self, point: Vec3) -> bool {
        self.bounds.contains_point(point)
    }

    /// Индексы треугольников, чьи ячейки задевает `aabb` (sorted, unique)
    pub fn query_aabb(&self, aabb: &Aabb) -> Vec<usize> {
        self.grid.query(aabb)
    }

    /// Первое попадание по отрезку `from → to`
    pub fn raycast(&self, from: Vec3, to: Vec3) -> Option<RayHit> {
        let (ray, length) = Ray::between(from, to)?;
        let query = Aabb::new(from.min(to), from.max(to));

        let mut best: Option<RayHit> = None;
        for index in self.query_aabb(&query) {
            let tri = &self.triangles[index];
            let Some(t) = ray_triangle(&ray, tri, length) else {
                continue;
            };
            if best.is_some_and(|hit| hit.distance <= t) {
                continue;
            }
            let mut normal = tri.normal();
            if normal.dot(ray.direction) > 0.0 {
                normal = -normal;
            }
            best = Some(RayHit {
                distance: t,
                point: ray.at(t),
                normal,
                triangle: index,
            });
        }
        best
    }

    pub fn line_of_sight(&self, from: Vec3, to: Vec3) -> bool {
        let length = from.distance(to);
        match self.raycast(from, to) {
            Some(hit) => hit.distance >= length - LOS_TOLERANCE,
            None => true,
        }
    }
}

fn validate_geometry(triangles: &[Triangle], bounds: &Aabb, player_spawn: Vec3) -> SimulationResult<()> {
    if !bounds.is_valid() {
        return Err(SimulationError::CorruptLevel(format!(
            "empty or non-finite bounds {:?}..{:?}",
            bounds.min, bounds.max
        )));
    }
    if triangles.is_empty() {
        return Err(SimulationError::CorruptLevel("level has no geometry".into()));
    }
    if let Some(index) = triangles.iter().position(Triangle::is_degenerate) {
        return Err(SimulationError::CorruptLevel(format!(
            "triangle {} is degenerate or non-finite",
            index
        )));
    }
    if !bounds.contains_point(player_spawn) {
        return Err(SimulationError::CorruptLevel(format!(
            "player spawn {:?} outside level bounds",
            player_spawn
        )));
    }
    Ok(())
}
