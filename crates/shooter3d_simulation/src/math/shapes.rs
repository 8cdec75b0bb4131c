//! Геометрические примитивы: Aabb, Capsule, Triangle, Ray

use bevy::prelude::*;

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self {
            min: min.min(max),
            max: min.max(max),
        }
    }

    pub fn from_center_half_extents(center: Vec3, half_extents: Vec3) -> Self {
        Self::new(center - half_extents, center + half_extents)
    }

    pub fn from_points(points: &[Vec3]) -> Option<Self> {
        let (first, rest) = points.split_first()?;
        let mut aabb = Self::new(*first, *first);
        for point in rest {
            aabb.min = aabb.min.min(*point);
            aabb.max = aabb.max.max(*point);
        }
        Some(aabb)
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn half_extents(&self) -> Vec3 {
        (self.max - self.min) * 0.5
    }

    pub fn expanded(&self, amount: f32) -> Self {
        Self::new(self.min - Vec3::splat(amount), self.max + Vec3::splat(amount))
    }

    pub fn merge(&self, other: &Aabb) -> Self {
        Self::new(self.min.min(other.min), self.max.max(other.max))
    }

    pub fn overlaps(&self, other: &Aabb) -> bool {
        self.min.cmple(other.max).all() && other.min.cmple(self.max).all()
    }

    pub fn contains_point(&self, point: Vec3) -> bool {
        self.min.cmple(point).all() && point.cmple(self.max).all()
    }

    pub fn is_valid(&self) -> bool {
        self.min.is_finite() && self.max.is_finite() && self.min.cmplt(self.max).all()
    }

    /// 12 треугольников коробки, нормали наружу (CCW снаружи)
    pub fn triangles(&self) -> [Triangle; 12] {
        let (lo, hi) = (self.min, self.max);
        let p = [
            Vec3::new(lo.x, lo.y, lo.z),
            Vec3::new(hi.x, lo.y, lo.z),
            Vec3::new(hi.x, hi.y, lo.z),
            Vec3::new(lo.x, hi.y, lo.z),
            Vec3::new(lo.x, lo.y, hi.z),
            Vec3::new(hi.x, lo.y, hi.z),
            Vec3::new(hi.x, hi.y, hi.z),
            Vec3::new(lo.x, hi.y, hi.z),
        ];
        let quad = |a: usize, b: usize, c: usize, d: usize| {
            [Triangle::new(p[a], p[b], p[c]), Triangle::new(p[a], p[c], p[d])]
        };
        let faces = [
            quad(4, 5, 6, 7), // +Z
            quad(1, 0, 3, 2), // -Z
            quad(5, 1, 2, 6), // +X
            quad(0, 4, 7, 3), // -X
            quad(7, 6, 2, 3), // +Y
            quad(0, 1, 5, 4), // -Y
        ];
        let mut out = [Triangle::new(Vec3::ZERO, Vec3::X, Vec3::Y); 12];
        for (i, face) in faces.iter().enumerate() {
            out[i * 2] = face[0];
            out[i * 2 + 1] = face[1];
        }
        out
    }
}

/// Капсула: отрезок `a`–`b` + радиус. Сфера: вырожденная капсула (a == b).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Capsule {
    pub a: Vec3,
    pub b: Vec3,
    pub radius: f32,
}

impl Capsule {
    pub fn new(a: Vec3, b: Vec3, radius: f32) -> Self {
        Self { a, b, radius }
    }

    pub fn sphere(center: Vec3, radius: f32) -> Self {
        Self::new(center, center, radius)
    }

    /// Вертикальная капсула с центром `center`
    pub fn upright(center: Vec3, half_height: f32, radius: f32) -> Self {
        Self::new(
            center - Vec3::Y * half_height,
            center + Vec3::Y * half_height,
            radius,
        )
    }

    pub fn aabb(&self) -> Aabb {
        Aabb::new(self.a.min(self.b), self.a.max(self.b)).expanded(self.radius)
    }

    pub fn translated(&self, offset: Vec3) -> Self {
        Self::new(self.a + offset, self.b + offset, self.radius)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Triangle {
    pub a: Vec3,
    pub b: Vec3,
    pub c: Vec3,
}

impl Triangle {
    pub fn new(a: Vec3, b: Vec3, c: Vec3) -> Self {
        Self { a, b, c }
    }

    /// Ненормированная нормаль (длина = 2 × площадь)
    pub fn raw_normal(&self) -> Vec3 {
        (self.b - self.a).cross(self.c - self.a)
    }

    pub fn normal(&self) -> Vec3 {
        self.raw_normal().normalize_or_zero()
    }

    pub fn area(&self) -> f32 {
        self.raw_normal().length() * 0.5
    }

    pub fn aabb(&self) -> Aabb {
        Aabb::new(self.a.min(self.b).min(self.c), self.a.max(self.b).max(self.c))
    }

    pub fn is_degenerate(&self) -> bool {
        !(self.a.is_finite() && self.b.is_finite() && self.c.is_finite()) || self.area() < 1e-6
    }
}

/// Луч с нормированным направлением
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
}

impl Ray {
    /// `None` если направление нулевое
    pub fn new(origin: Vec3, direction: Vec3) -> Option<Self> {
        let direction = direction.try_normalize()?;
        Some(Self { origin, direction })
    }

    pub fn between(from: Vec3, to: Vec3) -> Option<(Self, f32)> {
        let delta = to - from;
        let length = delta.length();
        Self::new(from, delta).map(|ray| (ray, length))
    }

    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }
}
