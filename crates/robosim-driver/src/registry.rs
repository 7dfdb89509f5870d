//! 机器人注册表
//!
//! 保存每个机器人最新已知的位置与状态，是运行线程之间唯一共享的可变状态。
//!
//! # 同步机制
//!
//! 机器人集合在构造时固定，之后只修改记录内容，因此外层 `HashMap`
//! 不需要锁；每条记录各自持有一把 `parking_lot::Mutex`（细粒度锁）。
//! 所有操作都是"加锁 → 读或写 → 解锁"，不会有调用方跨越睡眠持锁。

use crate::error::SimError;
use parking_lot::Mutex;
use robosim_protocol::{Position, RobotId, RobotRecord, RobotStatus};
use std::collections::HashMap;

#[derive(Debug)]
pub struct RobotRegistry {
    records: HashMap<RobotId, Mutex<RobotRecord>>,
    /// 保持配置顺序，便于展示
    order: Vec<RobotId>,
}

impl RobotRegistry {
    /// 以默认记录（原点、`{80, EMPTY, IDLE}`）创建注册表，重复的标识只保留一次
    ///
    /// # Example
    ///
    /// ```
    /// use robosim_driver::{RobotId, RobotRegistry};
    ///
    /// let ids = ["ROBOT-001", "ROBOT-002"].map(|s| RobotId::new(s).unwrap());
    /// let registry = RobotRegistry::new(ids);
    /// assert_eq!(registry.len(), 2);
    /// ```
    pub fn new(ids: impl IntoIterator<Item = RobotId>) -> Self {
        Self::with_records(ids.into_iter().map(|id| (id, RobotRecord::default())))
    }

    /// 以给定的初始记录创建注册表
    pub fn with_records(records: impl IntoIterator<Item = (RobotId, RobotRecord)>) -> Self {
        let mut map = HashMap::new();
        let mut order = Vec::new();
        for (id, record) in records {
            if !map.contains_key(&id) {
                order.push(id.clone());
                map.insert(id, Mutex::new(record));
            }
        }
        Self {
            records: map,
            order,
        }
    }

    /// 配置的机器人标识（配置顺序）
    pub fn ids(&self) -> &[RobotId] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn contains(&self, id: &RobotId) -> bool {
        self.records.contains_key(id)
    }

    fn entry(&self, id: &RobotId) -> Result<&Mutex<RobotRecord>, SimError> {
        self.records
            .get(id)
            .ok_or_else(|| SimError::UnknownRobot(id.clone()))
    }

    /// 读取完整记录（副本）
    pub fn get(&self, id: &RobotId) -> Result<RobotRecord, SimError> {
        Ok(*self.entry(id)?.lock())
    }

    pub fn get_position(&self, id: &RobotId) -> Result<Position, SimError> {
        Ok(self.entry(id)?.lock().position)
    }

    pub fn get_status(&self, id: &RobotId) -> Result<RobotStatus, SimError> {
        Ok(self.entry(id)?.lock().status)
    }

    /// 写入位置
    ///
    /// # Errors
    /// - `UnknownRobot`
    /// - `InvalidParameter`: 坐标含 NaN/Inf
    pub fn set_position(&self, id: &RobotId, position: Position) -> Result<(), SimError> {
        let entry = self.entry(id)?;
        if !position.is_finite() {
            return Err(SimError::InvalidParameter(format!(
                "position must be finite, got ({}, {}, {})",
                position.x, position.y, position.z
            )));
        }
        entry.lock().position = position;
        Ok(())
    }

    /// 写入状态（电量必须在 0..=100）
    pub fn set_status(&self, id: &RobotId, status: RobotStatus) -> Result<(), SimError> {
        let entry = self.entry(id)?;
        status.validate()?;
        entry.lock().status = status;
        Ok(())
    }

    /// 原地修改状态（操作员编辑）
    ///
    /// 修改结果不合法时回滚并返回错误；成功时返回修改后的状态。
    pub fn update_status<F>(&self, id: &RobotId, edit: F) -> Result<RobotStatus, SimError>
    where
        F: FnOnce(&mut RobotStatus),
    {
        let mut record = self.entry(id)?.lock();
        let mut status = record.status;
        edit(&mut status);
        status.validate()?;
        record.status = status;
        Ok(status)
    }

    /// 所有机器人的记录快照（配置顺序）
    pub fn snapshot(&self) -> Vec<(RobotId, RobotRecord)> {
        self.order
            .iter()
            .filter_map(|id| self.records.get(id).map(|r| (id.clone(), *r.lock())))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use robosim_protocol::{OperationalStatus, Role};
    use std::sync::Arc;
    use std::thread;

    fn ids(names: &[&str]) -> Vec<RobotId> {
        names.iter().map(|n| RobotId::new(*n).unwrap()).collect()
    }

    #[test]
    fn test_defaults() {
        let registry = RobotRegistry::new(ids(&["ROBOT-001", "ROBOT-002", "ROBOT-003"]));
        assert_eq!(registry.len(), 3);
        for id in registry.ids() {
            let record = registry.get(id).unwrap();
            assert_eq!(record.position, Position::ORIGIN);
            assert_eq!(record.status, RobotStatus::default());
        }
    }

    #[test]
    fn test_duplicate_ids_collapsed() {
        let registry = RobotRegistry::new(ids(&["A", "B", "A"]));
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.ids(), ids(&["A", "B"]).as_slice());
    }

    #[test]
    fn test_unknown_robot() {
        let registry = RobotRegistry::new(ids(&["A"]));
        let ghost = RobotId::new("GHOST").unwrap();
        assert!(matches!(registry.get(&ghost), Err(SimError::UnknownRobot(_))));
        assert!(matches!(
            registry.set_position(&ghost, Position::ORIGIN),
            Err(SimError::UnknownRobot(_))
        ));
        assert!(matches!(
            registry.set_status(&ghost, RobotStatus::default()),
            Err(SimError::UnknownRobot(_))
        ));
    }

    #[test]
    fn test_set_and_get() {
        let registry = RobotRegistry::new(ids(&["A", "B"]));
        let a = &registry.ids()[0].clone();
        let b = &registry.ids()[1].clone();

        registry.set_position(a, Position::planar(12.5, -3.0)).unwrap();
        let status = RobotStatus::new(42, Role::Harvesting, OperationalStatus::Working).unwrap();
        registry.set_status(b, status).unwrap();

        assert_eq!(registry.get_position(a).unwrap(), Position::planar(12.5, -3.0));
        assert_eq!(registry.get_status(a).unwrap(), RobotStatus::default());
        assert_eq!(registry.get_position(b).unwrap(), Position::ORIGIN);
        assert_eq!(registry.get_status(b).unwrap(), status);
    }

    #[test]
    fn test_rejects_invalid_values() {
        let registry = RobotRegistry::new(ids(&["A"]));
        let a = registry.ids()[0].clone();

        assert!(matches!(
            registry.set_position(&a, Position::planar(f64::NAN, 0.0)),
            Err(SimError::InvalidParameter(_))
        ));

        let bad = RobotStatus {
            battery_level: 101,
            ..RobotStatus::default()
        };
        assert!(matches!(registry.set_status(&a, bad), Err(SimError::Protocol(_))));
        assert_eq!(registry.get_status(&a).unwrap(), RobotStatus::default());
    }

    #[test]
    fn test_update_status_rolls_back_invalid_edit() {
        let registry = RobotRegistry::new(ids(&["A"]));
        let a = registry.ids()[0].clone();

        let updated = registry
            .update_status(&a, |s| {
                s.battery_level = 50;
                s.role = Role::Cleaning;
            })
            .unwrap();
        assert_eq!(updated.battery_level, 50);
        assert_eq!(updated.role, Role::Cleaning);

        assert!(registry.update_status(&a, |s| s.battery_level = 255).is_err());
        assert_eq!(registry.get_status(&a).unwrap().battery_level, 50);
    }

    #[test]
    fn test_concurrent_writers_on_different_robots() {
        let registry = Arc::new(RobotRegistry::new(ids(&["A", "B"])));
        let mut handles = Vec::new();
        for id in registry.ids().to_vec() {
            let registry = registry.clone();
            handles.push(thread::spawn(move || {
                for i in 0..1000 {
                    registry
                        .set_position(&id, Position::planar(i as f64, i as f64))
                        .unwrap();
                    registry.update_status(&id, |s| s.battery_level = (i % 101) as u8).unwrap();
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
        for (_, record) in registry.snapshot() {
            assert_eq!(record.position, Position::planar(999.0, 999.0));
            assert_eq!(record.status.battery_level, (999 % 101) as u8);
        }
    }
}
