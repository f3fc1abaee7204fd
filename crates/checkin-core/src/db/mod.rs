//! Database layer for checkin

mod connection;
mod migrations;
mod repository;

pub use connection::Database;
pub use repository::{
    EventRepository, LibSqlEventRepository, LibSqlParticipantRepository, LibSqlRegformRepository,
    ParticipantRepository, RegformRemoval, RegformRepository,
};
