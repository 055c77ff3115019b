//! FSM commit engine.

mod action;
mod engine;

pub use action::{ActionSet, FsmAction, FsmKind};
pub use engine::{Fsm, FsmConfig, FsmExecutor, FsmState, FsmStep, StepMode};

use crate::handle::{ApId, EpId, RadioId};
use serde::Serialize;
use std::fmt;

/// Entity owning an FSM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum FsmEntity {
    Radio(RadioId),
    AccessPoint(ApId),
    Endpoint(EpId),
}

impl FsmEntity {
    pub fn kind(&self) -> FsmKind {
        match self {
            FsmEntity::Radio(_) => FsmKind::Radio,
            FsmEntity::AccessPoint(_) => FsmKind::AccessPoint,
            FsmEntity::Endpoint(_) => FsmKind::Endpoint,
        }
    }
}

impl fmt::Display for FsmEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FsmEntity::Radio(id) => id.fmt(f),
            FsmEntity::AccessPoint(id) => id.fmt(f),
            FsmEntity::Endpoint(id) => id.fmt(f),
        }
    }
}

impl From<RadioId> for FsmEntity {
    fn from(id: RadioId) -> Self {
        FsmEntity::Radio(id)
    }
}

impl From<ApId> for FsmEntity {
    fn from(id: ApId) -> Self {
        FsmEntity::AccessPoint(id)
    }
}

impl From<EpId> for FsmEntity {
    fn from(id: EpId) -> Self {
        FsmEntity::Endpoint(id)
    }
}
