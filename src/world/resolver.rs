//! 物体解析：用户给出的名字 -> 世界中唯一的物体
//!
//! 先精确匹配（区分大小写）；没有则忽略大小写匹配，多个候选时取字典序最小者并记为软警告。

use crate::core::OrchestratorError;
use crate::world::{WorldObject, WorldSnapshot};

/// 一次解析的结果，借用快照中的物体
#[derive(Debug, Clone)]
pub struct Resolution<'a> {
    pub object: &'a WorldObject,
    /// 忽略大小写匹配到多个物体时，其余候选的名字（非空即为软警告）
    pub other_candidates: Vec<&'a str>,
}

impl Resolution<'_> {
    pub fn is_ambiguous(&self) -> bool {
        !self.other_candidates.is_empty()
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ObjectResolver;

impl ObjectResolver {
    pub fn new() -> Self {
        Self
    }

    /// 在给定快照中解析名字；纯查询，无副作用
    pub fn resolve<'a>(
        &self,
        objects: &'a [WorldObject],
        name: &str,
    ) -> Result<Resolution<'a>, OrchestratorError> {
        if let Some(object) = objects.iter().find(|o| o.name == name) {
            return Ok(Resolution { object, other_candidates: Vec::new() });
        }

        let wanted = name.to_lowercase();
        let mut matches: Vec<&WorldObject> = objects
            .iter()
            .filter(|o| o.name.to_lowercase() == wanted)
            .collect();
        matches.sort_by(|a, b| a.name.cmp(&b.name));

        let mut iter = matches.into_iter();
        let object = iter
            .next()
            .ok_or_else(|| OrchestratorError::ObjectNotFound(name.to_string()))?;
        let other_candidates: Vec<&str> = iter.map(|o| o.name.as_str()).collect();
        if !other_candidates.is_empty() {
            tracing::warn!(
                requested = name,
                chosen = %object.name,
                others = ?other_candidates,
                "Ambiguous object name, using lexicographically first match"
            );
        }
        Ok(Resolution { object, other_candidates })
    }

    /// 读取最新快照并解析，返回物体的拷贝（用于跨阻塞调用的阶段）
    pub async fn resolve_current<W: WorldSnapshot + ?Sized>(
        &self,
        world: &W,
        name: &str,
    ) -> Result<(WorldObject, bool), OrchestratorError> {
        let objects = world.list_objects().await?;
        let resolution = self.resolve(&objects, name)?;
        Ok((resolution.object.clone(), resolution.is_ambiguous()))
    }
}
