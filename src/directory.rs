//! Who runs a station.
//!
//! Stations, users and roles are owned by the surrounding application; the
//! handover chain only asks who currently manages or owns a station and
//! whether someone works there.

use async_trait::async_trait;
use sqlx::PgPool;
use std::collections::{HashMap, HashSet};

use crate::error::{HandoverError, Result};

#[async_trait]
pub trait StationDirectory: Send + Sync {
    async fn manager_of(&self, station_id: &str) -> Result<String>;

    async fn owner_of(&self, station_id: &str) -> Result<String>;

    async fn is_member(&self, station_id: &str, user_id: &str) -> Result<bool>;
}

/// Reads `station_roles(station_id, user_id, role)` maintained by the admin app.
pub struct PgStationDirectory {
    db_pool: PgPool,
}

impl PgStationDirectory {
    pub fn new(db_pool: PgPool) -> Self {
        Self { db_pool }
    }

    async fn holder_of(&self, station_id: &str, role: &str) -> Result<String> {
        // most recent assignment wins when a role changed hands
        let user_id: Option<String> = sqlx::query_scalar(
            r#"
            SELECT user_id FROM public.station_roles
            WHERE station_id = $1 AND role = $2
            ORDER BY assigned_at DESC
            LIMIT 1
            "#,
        )
        .bind(station_id)
        .bind(role)
        .fetch_optional(&self.db_pool)
        .await?;

        user_id.ok_or_else(|| HandoverError::NotFound(format!("{role} of station {station_id}")))
    }
}

#[async_trait]
impl StationDirectory for PgStationDirectory {
    async fn manager_of(&self, station_id: &str) -> Result<String> {
        self.holder_of(station_id, "manager").await
    }

    async fn owner_of(&self, station_id: &str) -> Result<String> {
        self.holder_of(station_id, "owner").await
    }

    async fn is_member(&self, station_id: &str, user_id: &str) -> Result<bool> {
        let member = sqlx::query(
            r#"SELECT 1 FROM public.station_roles WHERE station_id = $1 AND user_id = $2 LIMIT 1"#,
        )
        .bind(station_id)
        .bind(user_id)
        .fetch_optional(&self.db_pool)
        .await?
        .is_some();

        Ok(member)
    }
}

#[derive(Debug, Clone, Default)]
struct StationRoles {
    manager: Option<String>,
    owner: Option<String>,
    members: HashSet<String>,
}

/// Fixed role table, for tests and single-site deployments.
#[derive(Debug, Clone, Default)]
pub struct StaticDirectory {
    stations: HashMap<String, StationRoles>,
}

impl StaticDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a station with its manager and owner, both of whom become members.
    pub fn with_station(mut self, station_id: &str, manager: &str, owner: &str) -> Self {
        let roles = self.stations.entry(station_id.to_string()).or_default();
        roles.manager = Some(manager.to_string());
        roles.owner = Some(owner.to_string());
        roles.members.insert(manager.to_string());
        roles.members.insert(owner.to_string());
        self
    }

    pub fn with_member(mut self, station_id: &str, user_id: &str) -> Self {
        self.stations
            .entry(station_id.to_string())
            .or_default()
            .members
            .insert(user_id.to_string());
        self
    }

    fn station(&self, station_id: &str) -> Result<&StationRoles> {
        self.stations
            .get(station_id)
            .ok_or_else(|| HandoverError::NotFound(format!("station {station_id}")))
    }
}

#[async_trait]
impl StationDirectory for StaticDirectory {
    async fn manager_of(&self, station_id: &str) -> Result<String> {
        self.station(station_id)?
            .manager
            .clone()
            .ok_or_else(|| HandoverError::NotFound(format!("manager of station {station_id}")))
    }

    async fn owner_of(&self, station_id: &str) -> Result<String> {
        self.station(station_id)?
            .owner
            .clone()
            .ok_or_else(|| HandoverError::NotFound(format!("owner of station {station_id}")))
    }

    async fn is_member(&self, station_id: &str, user_id: &str) -> Result<bool> {
        Ok(self
            .stations
            .get(station_id)
            .is_some_and(|roles| roles.members.contains(user_id)))
    }
}
