/**
 * MODÈLES - Enregistrements exposés par l'API Command Center
 *
 * RÔLE : Types des tables (serveurs, tickets, métriques, utilisateurs, réglages)
 * et des payloads d'écriture (création + patch partiel) avec leur validation.
 *
 * FORMAT : JSON camelCase côté fil (serverId, cpuUsage...), horodatages RFC3339.
 */

use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;
use time::OffsetDateTime;

/// Validation métier appliquée après la désérialisation d'un payload
pub trait Validate {
    fn validate(&self) -> Result<(), String>;
}

fn require_non_empty(field: &str, value: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{field} must not be empty"));
    }
    Ok(())
}

fn require_optional_non_empty(field: &str, value: &Option<String>) -> Result<(), String> {
    match value {
        Some(v) => require_non_empty(field, v),
        None => Ok(()),
    }
}

fn require_percentage(field: &str, value: f64) -> Result<(), String> {
    if !value.is_finite() || !(0.0..=100.0).contains(&value) {
        return Err(format!("{field} must be within 0..=100"));
    }
    Ok(())
}

fn require_non_negative(field: &str, value: f64) -> Result<(), String> {
    if !value.is_finite() || value < 0.0 {
        return Err(format!("{field} must be a finite, non-negative number"));
    }
    Ok(())
}

pub const MAX_LOAD: u8 = 100;
pub const DEFAULT_SERVER_NAME: &str = "Unnamed Server";

// ---------------------------------------------------------------------------
// Serveurs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerStatus {
    Healthy,
    Warning,
    Critical,
    Maintenance,
}

impl ServerStatus {
    pub const ALL: [ServerStatus; 4] = [
        ServerStatus::Healthy,
        ServerStatus::Warning,
        ServerStatus::Critical,
        ServerStatus::Maintenance,
    ];

    /// Plage de charge plausible pour un statut (utilisée par le refresher)
    pub fn load_range(self) -> RangeInclusive<u8> {
        match self {
            ServerStatus::Healthy => 0..=60,
            ServerStatus::Warning => 60..=80,
            ServerStatus::Critical => 80..=100,
            ServerStatus::Maintenance => 0..=0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Server {
    pub id: u64,
    pub server_id: String,
    // absent sur les snapshots live
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub region: String,
    pub status: ServerStatus,
    pub load: u8,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewServer {
    pub server_id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub region: String,
    pub status: ServerStatus,
    #[serde(default)]
    pub load: u8,
}

impl Validate for NewServer {
    fn validate(&self) -> Result<(), String> {
        require_non_empty("serverId", &self.server_id)?;
        require_non_empty("region", &self.region)?;
        require_optional_non_empty("name", &self.name)?;
        if self.load > MAX_LOAD {
            return Err(format!("load must be within 0..={MAX_LOAD}"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerPatch {
    pub server_id: Option<String>,
    pub name: Option<String>,
    pub region: Option<String>,
    pub status: Option<ServerStatus>,
    pub load: Option<u8>,
}

impl ServerPatch {
    pub fn is_empty(&self) -> bool {
        self.server_id.is_none()
            && self.name.is_none()
            && self.region.is_none()
            && self.status.is_none()
            && self.load.is_none()
    }

    pub fn apply(self, server: &mut Server) {
        if let Some(server_id) = self.server_id {
            server.server_id = server_id;
        }
        if let Some(name) = self.name {
            server.name = Some(name);
        }
        if let Some(region) = self.region {
            server.region = region;
        }
        if let Some(status) = self.status {
            server.status = status;
        }
        if let Some(load) = self.load {
            server.load = load;
        }
    }
}

impl Validate for ServerPatch {
    fn validate(&self) -> Result<(), String> {
        if self.is_empty() {
            return Err("no fields to update".into());
        }
        require_optional_non_empty("serverId", &self.server_id)?;
        require_optional_non_empty("name", &self.name)?;
        require_optional_non_empty("region", &self.region)?;
        match self.load {
            Some(load) if load > MAX_LOAD => Err(format!("load must be within 0..={MAX_LOAD}")),
            _ => Ok(()),
        }
    }
}

// ---------------------------------------------------------------------------
// Tickets
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TicketStatus {
    Open,
    InProgress,
    Resolved,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TicketPriority {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticket {
    pub id: u64,
    pub ticket_id: String,
    pub subject: String,
    pub status: TicketStatus,
    pub priority: TicketPriority,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTicket {
    pub ticket_id: String,
    pub subject: String,
    pub status: TicketStatus,
    pub priority: TicketPriority,
}

impl Validate for NewTicket {
    fn validate(&self) -> Result<(), String> {
        require_non_empty("ticketId", &self.ticket_id)?;
        require_non_empty("subject", &self.subject)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TicketPatch {
    pub ticket_id: Option<String>,
    pub subject: Option<String>,
    pub status: Option<TicketStatus>,
    pub priority: Option<TicketPriority>,
}

impl TicketPatch {
    pub fn is_empty(&self) -> bool {
        self.ticket_id.is_none() && self.subject.is_none() && self.status.is_none() && self.priority.is_none()
    }

    pub fn apply(self, ticket: &mut Ticket) {
        if let Some(ticket_id) = self.ticket_id {
            ticket.ticket_id = ticket_id;
        }
        if let Some(subject) = self.subject {
            ticket.subject = subject;
        }
        if let Some(status) = self.status {
            ticket.status = status;
        }
        if let Some(priority) = self.priority {
            ticket.priority = priority;
        }
    }
}

impl Validate for TicketPatch {
    fn validate(&self) -> Result<(), String> {
        if self.is_empty() {
            return Err("no fields to update".into());
        }
        require_optional_non_empty("ticketId", &self.ticket_id)?;
        require_optional_non_empty("subject", &self.subject)
    }
}

// ---------------------------------------------------------------------------
// Métriques
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkMetric {
    pub id: u64,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub inbound: f64,
    pub outbound: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewNetworkMetric {
    pub inbound: f64,
    pub outbound: f64,
    #[serde(default)]
    pub asn: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
}

impl Validate for NewNetworkMetric {
    fn validate(&self) -> Result<(), String> {
        require_non_negative("inbound", self.inbound)?;
        require_non_negative("outbound", self.outbound)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemMetric {
    pub id: u64,
    pub cpu_usage: f64,
    pub memory_usage: f64,
    pub active_nodes: u64,
    pub total_nodes: u64,
    pub network_throughput: f64,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSystemMetric {
    pub cpu_usage: f64,
    pub memory_usage: f64,
    pub active_nodes: u64,
    pub total_nodes: u64,
    pub network_throughput: f64,
}

impl Validate for NewSystemMetric {
    fn validate(&self) -> Result<(), String> {
        require_percentage("cpuUsage", self.cpu_usage)?;
        require_percentage("memoryUsage", self.memory_usage)?;
        require_non_negative("networkThroughput", self.network_throughput)?;
        if self.active_nodes > self.total_nodes {
            return Err("activeNodes must not exceed totalNodes".into());
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Utilisateurs
// ---------------------------------------------------------------------------

/// Enregistrement complet (stockage uniquement, contient le hash du mot de passe)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    pub password: String,
}

/// Vue client d'un utilisateur : jamais de mot de passe
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PublicUser {
    pub id: String,
    pub username: String,
}

impl From<&User> for PublicUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            username: user.username.clone(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub username: String,
    pub password: String,
}

impl Validate for NewUser {
    fn validate(&self) -> Result<(), String> {
        require_non_empty("username", &self.username)?;
        require_non_empty("password", &self.password)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UserPatch {
    pub username: Option<String>,
    pub password: Option<String>,
}

impl Validate for UserPatch {
    fn validate(&self) -> Result<(), String> {
        if self.username.is_none() && self.password.is_none() {
            return Err("no fields to update".into());
        }
        require_optional_non_empty("username", &self.username)?;
        require_optional_non_empty("password", &self.password)
    }
}

// ---------------------------------------------------------------------------
// Réglages (singleton)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub id: u64,
    pub maintenance_mode: bool,
    pub alert_email: String,
    pub theme: String,
    pub notifications: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            id: 1,
            maintenance_mode: false,
            alert_email: String::new(),
            theme: "system".into(),
            notifications: "all".into(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SettingsPatch {
    pub maintenance_mode: Option<bool>,
    pub alert_email: Option<String>,
    pub theme: Option<String>,
    pub notifications: Option<String>,
}

impl SettingsPatch {
    pub fn apply(self, settings: &mut Settings) {
        if let Some(maintenance_mode) = self.maintenance_mode {
            settings.maintenance_mode = maintenance_mode;
        }
        if let Some(alert_email) = self.alert_email {
            settings.alert_email = alert_email;
        }
        if let Some(theme) = self.theme {
            settings.theme = theme;
        }
        if let Some(notifications) = self.notifications {
            settings.notifications = notifications;
        }
    }
}

impl Validate for SettingsPatch {
    fn validate(&self) -> Result<(), String> {
        // alertEmail vide = alertes désactivées
        if let Some(email) = &self.alert_email {
            if !email.is_empty() && !email.contains('@') {
                return Err("alertEmail must be an email address".into());
            }
        }
        require_optional_non_empty("theme", &self.theme)?;
        require_optional_non_empty("notifications", &self.notifications)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_load_ranges_stay_within_bounds() {
        for status in ServerStatus::ALL {
            let range = status.load_range();
            assert!(*range.end() <= MAX_LOAD);
        }
        assert_eq!(ServerStatus::Maintenance.load_range(), 0..=0);
    }

    #[test]
    fn test_server_patch_rejects_out_of_range_load() {
        let patch: ServerPatch = serde_json::from_value(serde_json::json!({"load": 101})).unwrap();
        assert!(patch.validate().is_err());

        let patch: ServerPatch = serde_json::from_value(serde_json::json!({"status": "critical", "load": 95})).unwrap();
        assert!(patch.validate().is_ok());
    }

    #[test]
    fn test_server_patch_rejects_unknown_status_and_negative_load() {
        assert!(serde_json::from_value::<ServerPatch>(serde_json::json!({"status": "exploded"})).is_err());
        assert!(serde_json::from_value::<ServerPatch>(serde_json::json!({"load": -1})).is_err());
    }

    #[test]
    fn test_empty_patch_is_invalid() {
        let patch: ServerPatch = serde_json::from_value(serde_json::json!({})).unwrap();
        assert_eq!(patch.validate(), Err("no fields to update".to_string()));
    }

    #[test]
    fn test_new_server_defaults() {
        let new: NewServer = serde_json::from_value(serde_json::json!({
            "serverId": "X1", "region": "us-east-1", "status": "healthy"
        }))
        .unwrap();
        assert_eq!(new.load, 0);
        assert!(new.name.is_none());
        assert!(new.validate().is_ok());
    }

    #[test]
    fn test_ticket_status_wire_format() {
        let json = serde_json::to_value(TicketStatus::InProgress).unwrap();
        assert_eq!(json, "in-progress");
    }

    #[test]
    fn test_public_user_has_no_password() {
        let user = User { id: "u1".into(), username: "admin".into(), password: "salt:hash".into() };
        let json = serde_json::to_value(PublicUser::from(&user)).unwrap();
        assert!(json.get("password").is_none());
        assert_eq!(json["username"], "admin");
    }

    #[test]
    fn test_system_metric_validation() {
        let bad = NewSystemMetric {
            cpu_usage: 120.0,
            memory_usage: 10.0,
            active_nodes: 1,
            total_nodes: 2,
            network_throughput: 1.0,
        };
        assert!(bad.validate().is_err());

        let bad_nodes = NewSystemMetric { cpu_usage: 10.0, active_nodes: 3, ..bad.clone() };
        assert!(bad_nodes.validate().is_err());
    }

    #[test]
    fn test_settings_patch_email() {
        let patch = SettingsPatch { alert_email: Some("not-an-email".into()), ..Default::default() };
        assert!(patch.validate().is_err());
        let patch = SettingsPatch { alert_email: Some(String::new()), ..Default::default() };
        assert!(patch.validate().is_ok());
    }
}
