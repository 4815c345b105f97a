//! 命名放置面与目的地解析
//!
//! 目的地可以是原始坐标，也可以是命名放置面（参考点 + 平面偏移）；后者的高度自动抬升到台面之上 clearance 处。
//! 导航开始前目的地必须解析为唯一的三维点。

use serde::{Deserialize, Serialize};

use crate::config::SurfacesSection;
use crate::core::OrchestratorError;
use crate::world::{Point, WorldBounds, WorldObject};

/// 台面查询的平面余量（米）
const SUPPORT_MARGIN: f64 = 0.02;
/// 物体参考点最多高出台面多少仍算「在台面上」
const SUPPORT_MAX_ABOVE: f64 = 0.2;
/// 参考点略低于台面（位姿取在物体底部附近时的数值误差）
const SUPPORT_BELOW_TOLERANCE: f64 = 0.01;

/// 命名放置面：参考点位于台面顶部中心
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedSurface {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub reference: Point,
    /// X 方向尺寸（米）
    pub width: f64,
    /// Y 方向尺寸（米）
    pub depth: f64,
}

impl NamedSurface {
    /// 平面上 (x, y) 是否落在台面范围内（含 margin）
    pub fn contains_planar(&self, x: f64, y: f64, margin: f64) -> bool {
        (x - self.reference.x).abs() <= self.width / 2.0 + margin
            && (y - self.reference.y).abs() <= self.depth / 2.0 + margin
    }

    /// 物体是否放在该台面上：XY 在范围内（2cm 余量）且位于台面之上 0.2m 以内
    pub fn supports(&self, object: &WorldObject) -> bool {
        let p = &object.pose.position;
        let above = p.z - self.reference.z;
        self.contains_planar(p.x, p.y, SUPPORT_MARGIN)
            && (-SUPPORT_BELOW_TOLERANCE..SUPPORT_MAX_ABOVE).contains(&above)
    }
}

/// 相对参考点的平面偏移（米）
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PlanarOffset {
    pub dx: f64,
    pub dy: f64,
}

/// 放置目的地
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Destination {
    Coordinates(Point),
    Surface {
        name: String,
        #[serde(default)]
        offset: PlanarOffset,
    },
}

impl Destination {
    pub fn surface(name: impl Into<String>) -> Self {
        Self::Surface { name: name.into(), offset: PlanarOffset::default() }
    }
}

impl From<[f64; 3]> for Destination {
    fn from(v: [f64; 3]) -> Self {
        Self::Coordinates(v.into())
    }
}

/// 放置面目录（来自配置）
#[derive(Debug, Clone)]
pub struct SurfaceCatalog {
    surfaces: Vec<NamedSurface>,
    clearance: f64,
}

impl SurfaceCatalog {
    pub fn new(surfaces: Vec<NamedSurface>, clearance: f64) -> Self {
        Self { surfaces, clearance }
    }

    pub fn from_config(section: &SurfacesSection) -> Self {
        Self::new(section.catalog.clone(), section.clearance_m)
    }

    pub fn clearance(&self) -> f64 {
        self.clearance
    }

    pub fn names(&self) -> Vec<&str> {
        self.surfaces.iter().map(|s| s.name.as_str()).collect()
    }

    /// 与物体解析同样的规则：精确匹配优先，其次忽略大小写取字典序最小
    pub fn get(&self, name: &str) -> Option<&NamedSurface> {
        if let Some(s) = self.surfaces.iter().find(|s| s.name == name) {
            return Some(s);
        }
        let wanted = name.to_lowercase();
        self.surfaces
            .iter()
            .filter(|s| s.name.to_lowercase() == wanted)
            .min_by(|a, b| a.name.cmp(&b.name))
    }

    /// 将目的地解析为唯一的三维点
    pub fn resolve(
        &self,
        destination: &Destination,
        bounds: &WorldBounds,
    ) -> Result<Point, OrchestratorError> {
        let point = match destination {
            Destination::Coordinates(p) => *p,
            Destination::Surface { name, offset } => {
                let surface = self.get(name).ok_or_else(|| {
                    OrchestratorError::DestinationUnresolved(format!(
                        "unknown surface '{name}' (known: {})",
                        self.names().join(", ")
                    ))
                })?;
                let x = surface.reference.x + offset.dx;
                let y = surface.reference.y + offset.dy;
                if !surface.contains_planar(x, y, 0.0) {
                    return Err(OrchestratorError::DestinationUnresolved(format!(
                        "offset ({:.3}, {:.3}) lies outside surface '{}'",
                        offset.dx, offset.dy, surface.name
                    )));
                }
                Point::new(x, y, surface.reference.z + self.clearance)
            }
        };

        if !bounds.contains(&point) {
            return Err(OrchestratorError::DestinationUnresolved(format!(
                "point ({:.3}, {:.3}, {:.3}) is outside the world bounds",
                point.x, point.y, point.z
            )));
        }
        Ok(point)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ErrorKind;
    use crate::world::Pose;

    fn catalog() -> SurfaceCatalog {
        SurfaceCatalog::new(
            vec![NamedSurface {
                name: "kitchen_island_surface".into(),
                description: "Kitchen island's main countertop".into(),
                reference: Point::new(-1.0675, 1.7192, 0.95),
                width: 0.9,
                depth: 2.0,
            }],
            0.05,
        )
    }

    fn bounds() -> WorldBounds {
        WorldBounds { min: Point::new(-5.0, -5.0, 0.0), max: Point::new(5.0, 5.0, 3.0) }
    }

    #[test]
    fn test_surface_zero_offset_raises_z_by_clearance() {
        let p = catalog().resolve(&Destination::surface("kitchen_island_surface"), &bounds()).unwrap();
        assert_eq!(p.x, -1.0675);
        assert_eq!(p.y, 1.7192);
        assert!((p.z - (0.95 + 0.05)).abs() < 1e-12);
    }

    #[test]
    fn test_surface_with_offset() {
        let dest = Destination::Surface {
            name: "Kitchen_Island_Surface".into(),
            offset: PlanarOffset { dx: 0.2, dy: -0.5 },
        };
        let p = catalog().resolve(&dest, &bounds()).unwrap();
        assert!((p.x - (-0.8675)).abs() < 1e-12);
        assert!((p.y - 1.2192).abs() < 1e-12);
    }

    #[test]
    fn test_offset_outside_surface_rejected() {
        let dest = Destination::Surface {
            name: "kitchen_island_surface".into(),
            offset: PlanarOffset { dx: 1.0, dy: 0.0 },
        };
        let err = catalog().resolve(&dest, &bounds()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DestinationUnresolved);
    }

    #[test]
    fn test_unknown_surface_and_out_of_bounds() {
        let c = catalog();
        let err = c.resolve(&Destination::surface("roof"), &bounds()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DestinationUnresolved);
        assert!(err.to_string().contains("known: kitchen_island_surface"));
        assert_eq!(
            c.resolve(&[9.0, 0.0, 1.0].into(), &bounds()).unwrap_err().kind(),
            ErrorKind::DestinationUnresolved
        );
        assert_eq!(c.resolve(&[1.0, 1.0, 0.8].into(), &bounds()).unwrap(), Point::new(1.0, 1.0, 0.8));
    }

    #[test]
    fn test_supports_object_on_top() {
        let c = catalog();
        let s = c.get("kitchen_island_surface").unwrap();
        let on = WorldObject::new("bowl", "Bowl", Pose::at(Point::new(-1.0, 1.5, 1.0)));
        let off = WorldObject::new("milk", "Milk", Pose::at(Point::new(2.0, 1.5, 1.0)));
        assert!(s.supports(&on));
        assert!(!s.supports(&off));
    }

    #[test]
    fn test_object_under_the_top_is_not_on_it() {
        let c = catalog();
        let s = c.get("kitchen_island_surface").unwrap();
        let under = WorldObject::new("pan", "Pan", Pose::at(Point::new(-1.0, 1.5, 0.8)));
        let flush = WorldObject::new("plate", "Plate", Pose::at(Point::new(-1.0, 1.5, 0.945)));
        let hovering = WorldObject::new("lamp", "Lamp", Pose::at(Point::new(-1.0, 1.5, 1.2)));
        assert!(!s.supports(&under));
        assert!(s.supports(&flush));
        assert!(!s.supports(&hovering));
    }
}
