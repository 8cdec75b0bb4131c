//! Intersection / closest-point тесты (narrow phase)
//!
//! Все функции чистые, без аллокаций. Формулы: классические
//! (closest point on triangle по регионам Вороного, segment-segment
//! clamp, Möller–Trumbore, slab test).

use bevy::prelude::*;

use super::shapes::{Aabb, Capsule, Ray, Triangle};

const EPSILON: f32 = 1e-6;

/// Результат overlap теста
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContactManifold {
    /// Нормаль контакта: направление, в котором надо сдвинуть первую форму
    pub normal: Vec3,
    /// Глубина проникновения (> 0 при overlap)
    pub depth: f32,
    /// Точка контакта (на поверхности второй формы)
    pub point: Vec3,
}

pub fn closest_point_on_segment(point: Vec3, a: Vec3, b: Vec3) -> Vec3 {
    let ab = b - a;
    let len_sq = ab.length_squared();
    if len_sq < EPSILON {
        return a;
    }
    let t = ((point - a).dot(ab) / len_sq).clamp(0.0, 1.0);
    a + ab * t
}

/// Ближайшие точки двух отрезков: (точка на p1q1, точка на p2q2)
pub fn closest_points_segments(p1: Vec3, q1: Vec3, p2: Vec3, q2: Vec3) -> (Vec3, Vec3) {
    let d1 = q1 - p1;
    let d2 = q2 - p2;
    let r = p1 - p2;
    let a = d1.length_squared();
    let e = d2.length_squared();
    let f = d2.dot(r);

    if a <= EPSILON && e <= EPSILON {
        return (p1, p2);
    }

    let (s, t);
    if a <= EPSILON {
        s = 0.0;
        t = (f / e).clamp(0.0, 1.0);
    } else {
        let c = d1.dot(r);
        if e <= EPSILON {
            t = 0.0;
            s = (-c / a).clamp(0.0, 1.0);
        } else {
            let b = d1.dot(d2);
            let denom = a * e - b * b;
            let mut s_candidate = if denom > EPSILON {
                ((b * f - c * e) / denom).clamp(0.0, 1.0)
            } else {
                0.0
            };
            let mut t_candidate = (b * s_candidate + f) / e;
            if t_candidate < 0.0 {
                t_candidate = 0.0;
                s_candidate = (-c / a).clamp(0.0, 1.0);
            } else if t_candidate > 1.0 {
                t_candidate = 1.0;
                s_candidate = ((b - c) / a).clamp(0.0, 1.0);
            }
            s = s_candidate;
            t = t_candidate;
        }
    }

    (p1 + d1 * s, p2 + d2 * t)
}

pub fn closest_point_on_triangle(point: Vec3, tri: &Triangle) -> Vec3 {
    let (a, b, c) = (tri.a, tri.b, tri.c);
    let ab = b - a;
    let ac = c - a;
    let ap = point - a;

    let d1 = ab.dot(ap);
    let d2 = ac.dot(ap);
    if d1 <= 0.0 && d2 <= 0.0 {
        return a;
    }

    let bp = point - b;
    let d3 = ab.dot(bp);
    let d4 = ac.dot(bp);
    if d3 >= 0.0 && d4 <= d3 {
        return b;
    }

    let vc = d1 * d4 - d3 * d2;
    if vc <= 0.0 && d1 >= 0.0 && d3 <= 0.0 {
        let v = d1 / (d1 - d3);
        return a + ab * v;
    }

    let cp = point - c;
    let d5 = ab.dot(cp);
    let d6 = ac.dot(cp);
    if d6 >= 0.0 && d5 <= d6 {
        return c;
    }

    let vb = d5 * d2 - d1 * d6;
    if vb <= 0.0 && d2 >= 0.0 && d6 <= 0.0 {
        let w = d2 / (d2 - d6);
        return a + ac * w;
    }

    let va = d3 * d6 - d5 * d4;
    if va <= 0.0 && (d4 - d3) >= 0.0 && (d5 - d6) >= 0.0 {
        let w = (d4 - d3) / ((d4 - d3) + (d5 - d6));
        return b + (c - b) * w;
    }

    let denom = 1.0 / (va + vb + vc);
    let v = vb * denom;
    let w = vc * denom;
    a + ab * v + ac * w
}

/// Ближайшие точки отрезка и треугольника: (точка на отрезке, точка на треугольнике)
pub fn closest_points_segment_triangle(p: Vec3, q: Vec3, tri: &Triangle) -> (Vec3, Vec3) {
    // Отрезок пересекает треугольник: расстояние 0
    if let Some((ray, length)) = Ray::between(p, q) {
        if let Some(t) = ray_triangle(&ray, tri, length) {
            let hit = ray.at(t);
            return (hit, hit);
        }
    }

    let mut best = (p, closest_point_on_triangle(p, tri));
    let mut best_dist = best.0.distance_squared(best.1);

    let mut consider = |candidate: (Vec3, Vec3)| {
        let dist = candidate.0.distance_squared(candidate.1);
        if dist < best_dist {
            best_dist = dist;
            best = candidate;
        }
    };

    consider((q, closest_point_on_triangle(q, tri)));
    for (e0, e1) in [(tri.a, tri.b), (tri.b, tri.c), (tri.c, tri.a)] {
        consider(closest_points_segments(p, q, e0, e1));
    }

    best
}

/// Capsule vs capsule (сферы: вырожденные капсулы)
pub fn capsule_capsule(first: &Capsule, second: &Capsule) -> Option<ContactManifold> {
    let (on_first, on_second) = closest_points_segments(first.a, first.b, second.a, second.b);
    let delta = on_first - on_second;
    let dist_sq = delta.length_squared();
    let radius_sum = first.radius + second.radius;

    if dist_sq >= radius_sum * radius_sum {
        return None;
    }

    let dist = dist_sq.sqrt();
    // Совпадающие центры: выталкиваем вверх, чтобы результат был детерминированным
    let normal = if dist > EPSILON { delta / dist } else { Vec3::Y };

    Some(ContactManifold {
        normal,
        depth: radius_sum - dist,
        point: on_second + normal * second.radius,
    })
}

/// Capsule vs triangle. Нормаль направлена от треугольника к капсуле.
pub fn capsule_triangle(capsule: &Capsule, tri: &Triangle) -> Option<ContactManifold> {
    let (on_segment, on_triangle) = closest_points_segment_triangle(capsule.a, capsule.b, tri);
    let delta = on_segment - on_triangle;
    let dist_sq = delta.length_squared();

    if dist_sq >= capsule.radius * capsule.radius {
        return None;
    }

    let dist = dist_sq.sqrt();
    let normal = if dist > EPSILON {
        delta / dist
    } else {
        // Ось капсулы проходит через треугольник: используем нормаль грани
        let face = tri.normal();
        let center = (capsule.a + capsule.b) * 0.5;
        if face.dot(center - on_triangle) >= 0.0 {
            face
        } else {
            -face
        }
    };

    Some(ContactManifold {
        normal,
        depth: capsule.radius - dist,
        point: on_triangle,
    })
}

/// Расстояние от капсулы до треугольника (0 при пересечении оси)
pub fn capsule_triangle_distance(capsule: &Capsule, tri: &Triangle) -> f32 {
    let (on_segment, on_triangle) = closest_points_segment_triangle(capsule.a, capsule.b, tri);
    (on_segment.distance(on_triangle) - capsule.radius).max(0.0)
}

/// Möller–Trumbore. Возвращает t ∈ [0, max_t]; треугольник двусторонний.
pub fn ray_triangle(ray: &Ray, tri: &Triangle, max_t: f32) -> Option<f32> {
    let edge1 = tri.b - tri.a;
    let edge2 = tri.c - tri.a;
    let pvec = ray.direction.cross(edge2);
    let det = edge1.dot(pvec);
    if det.abs() < EPSILON {
        return None;
    }

    let inv_det = 1.0 / det;
    let tvec = ray.origin - tri.a;
    let u = tvec.dot(pvec) * inv_det;
    if !(0.0..=1.0).contains(&u) {
        return None;
    }

    let qvec = tvec.cross(edge1);
    let v = ray.direction.dot(qvec) * inv_det;
    if v < 0.0 || u + v > 1.0 {
        return None;
    }

    let t = edge2.dot(qvec) * inv_det;
    (0.0..=max_t).contains(&t).then_some(t)
}

pub fn ray_sphere(ray: &Ray, center: Vec3, radius: f32, max_t: f32) -> Option<f32> {
    let m = ray.origin - center;
    let b = m.dot(ray.direction);
    let c = m.length_squared() - radius * radius;
    if c > 0.0 && b > 0.0 {
        return None;
    }

    let discriminant = b * b - c;
    if discriminant < 0.0 {
        return None;
    }

    let t = (-b - discriminant.sqrt()).max(0.0);
    (t <= max_t).then_some(t)
}

/// Slab test. Возвращает t входа (0 если origin внутри).
pub fn ray_aabb(ray: &Ray, aabb: &Aabb, max_t: f32) -> Option<f32> {
    let mut t_min = 0.0_f32;
    let mut t_max = max_t;

    for axis in 0..3 {
        let origin = ray.origin[axis];
        let direction = ray.direction[axis];
        let (lo, hi) = (aabb.min[axis], aabb.max[axis]);

        if direction.abs() < EPSILON {
            if origin < lo || origin > hi {
                return None;
            }
            continue;
        }

        let inv = 1.0 / direction;
        let mut t1 = (lo - origin) * inv;
        let mut t2 = (hi - origin) * inv;
        if t1 > t2 {
            std::mem::swap(&mut t1, &mut t2);
        }
        t_min = t_min.max(t1);
        t_max = t_max.min(t2);
        if t_min > t_max {
            return None;
        }
    }

    Some(t_min)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn floor() -> Triangle {
        Triangle::new(
            Vec3::new(-10.0, 0.0, -10.0),
            Vec3::new(-10.0, 0.0, 10.0),
            Vec3::new(10.0, 0.0, 0.0),
        )
    }

    #[test]
    fn test_closest_point_on_segment_clamps() {
        let a = Vec3::ZERO;
        let b = Vec3::X * 2.0;
        assert_eq!(closest_point_on_segment(Vec3::new(-1.0, 1.0, 0.0), a, b), a);
        assert_eq!(closest_point_on_segment(Vec3::new(1.0, 1.0, 0.0), a, b), Vec3::X);
        assert_eq!(closest_point_on_segment(Vec3::new(5.0, 0.0, 0.0), a, b), b);
    }

    #[test]
    fn test_closest_points_parallel_segments() {
        let (p, q) = closest_points_segments(
            Vec3::ZERO,
            Vec3::X,
            Vec3::new(0.0, 1.0, 0.0),
            Vec3::new(1.0, 1.0, 0.0),
        );
        assert!((p.distance(q) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_closest_points_crossing_segments() {
        let (p, q) = closest_points_segments(
            Vec3::new(-1.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(0.0, 2.0, -1.0),
            Vec3::new(0.0, 2.0, 1.0),
        );
        assert!(p.distance(Vec3::ZERO) < 1e-5);
        assert!(q.distance(Vec3::new(0.0, 2.0, 0.0)) < 1e-5);
    }

    #[test]
    fn test_closest_point_on_triangle_regions() {
        let tri = Triangle::new(Vec3::ZERO, Vec3::X, Vec3::Z);

        // Над внутренностью: проекция
        let inside = closest_point_on_triangle(Vec3::new(0.2, 3.0, 0.2), &tri);
        assert!(inside.distance(Vec3::new(0.2, 0.0, 0.2)) < 1e-5);

        // Около вершины
        assert_eq!(closest_point_on_triangle(Vec3::new(-1.0, 0.0, -1.0), &tri), Vec3::ZERO);

        // Около ребра b–c
        let edge = closest_point_on_triangle(Vec3::new(1.0, 0.0, 1.0), &tri);
        assert!(edge.distance(Vec3::new(0.5, 0.0, 0.5)) < 1e-5);
    }

    #[test]
    fn test_capsule_capsule_overlap() {
        let player = Capsule::upright(Vec3::new(0.0, 1.0, 0.0), 0.5, 0.5);
        let bullet = Capsule::sphere(Vec3::new(0.0, 1.5, 0.5), 0.1);
        let contact = capsule_capsule(&bullet, &player).expect("overlap");
        assert!(contact.normal.z > 0.99);
        assert!((contact.depth - 0.1).abs() < 1e-5);

        let far = Capsule::sphere(Vec3::new(0.0, 1.5, 3.0), 0.1);
        assert!(capsule_capsule(&far, &player).is_none());
    }

    #[test]
    fn test_capsule_capsule_coincident_centers() {
        let a = Capsule::sphere(Vec3::ONE, 0.5);
        let contact = capsule_capsule(&a, &a).expect("overlap");
        assert_eq!(contact.normal, Vec3::Y);
        assert!((contact.depth - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_capsule_triangle_pushes_up() {
        let capsule = Capsule::upright(Vec3::new(0.0, 0.9, 0.0), 0.5, 0.5);
        let contact = capsule_triangle(&capsule, &floor()).expect("touching floor");
        assert!(contact.normal.y > 0.99);
        assert!((contact.depth - 0.1).abs() < 1e-4);

        let above = Capsule::upright(Vec3::new(0.0, 1.2, 0.0), 0.5, 0.5);
        assert!(capsule_triangle(&above, &floor()).is_none());
        assert!((capsule_triangle_distance(&above, &floor()) - 0.2).abs() < 1e-4);
    }

    #[test]
    fn test_swept_segment_through_triangle() {
        // Быстрый снаряд пролетел сквозь пол за один тик
        let swept = Capsule::new(Vec3::new(0.0, 1.0, 0.0), Vec3::new(0.0, -1.0, 0.0), 0.05);
        let contact = capsule_triangle(&swept, &floor()).expect("swept hit");
        assert!(contact.point.distance(Vec3::ZERO) < 1e-4);
    }

    #[test]
    fn test_ray_triangle_hit_and_miss() {
        let ray = Ray::new(Vec3::new(0.0, 5.0, 0.0), -Vec3::Y).unwrap();
        let t = ray_triangle(&ray, &floor(), 100.0).expect("hit floor");
        assert!((t - 5.0).abs() < 1e-5);

        // Слишком короткий луч
        assert!(ray_triangle(&ray, &floor(), 4.0).is_none());

        let up = Ray::new(Vec3::new(0.0, 5.0, 0.0), Vec3::Y).unwrap();
        assert!(ray_triangle(&up, &floor(), 100.0).is_none());
    }

    #[test]
    fn test_ray_sphere() {
        let ray = Ray::new(Vec3::ZERO, Vec3::Z).unwrap();
        let t = ray_sphere(&ray, Vec3::new(0.0, 0.0, 10.0), 1.0, 100.0).unwrap();
        assert!((t - 9.0).abs() < 1e-5);
        assert!(ray_sphere(&ray, Vec3::new(0.0, 3.0, 10.0), 1.0, 100.0).is_none());
        assert!(ray_sphere(&ray, Vec3::new(0.0, 0.0, -10.0), 1.0, 100.0).is_none());
    }

    #[test]
    fn test_ray_aabb() {
        let aabb = Aabb::new(Vec3::new(-1.0, -1.0, 4.0), Vec3::new(1.0, 1.0, 6.0));
        let ray = Ray::new(Vec3::ZERO, Vec3::Z).unwrap();
        assert!((ray_aabb(&ray, &aabb, 100.0).unwrap() - 4.0).abs() < 1e-5);
        assert!(ray_aabb(&ray, &aabb, 3.0).is_none());

        let side = Ray::new(Vec3::new(5.0, 0.0, 0.0), Vec3::Z).unwrap();
        assert!(ray_aabb(&side, &aabb, 100.0).is_none());
    }
}
