/**
 * STOCKAGE DURABLE - Interface de persistance des tables Command Center
 *
 * RÔLE :
 * Ce module définit le contrat commun que doit respecter tout backend de
 * stockage (serveurs, tickets, métriques, utilisateurs, réglages).
 *
 * FONCTIONNEMENT :
 * - Storage trait = opérations CRUD synchrones, courtes, sans await
 * - JsonStore = implémentation fichier JSON (un document, toutes les tables)
 * - seed = remise à zéro + données de démo
 *
 * UTILITÉ :
 * ✅ Les handlers HTTP écrivent toujours ici (jamais dans les caches live)
 * ✅ Repli des lectures quand les caches live sont vides
 * ✅ Backend interchangeable dans les tests (mémoire, en échec...)
 */

pub mod json_store;
pub mod seed;

pub use json_store::JsonStore;

use crate::models::{
    NetworkMetric, NewNetworkMetric, NewServer, NewSystemMetric, NewTicket, NewUser, Server,
    ServerPatch, Settings, SettingsPatch, SystemMetric, Ticket, TicketPatch, User, UserPatch,
};
use sha2::{Digest, Sha256};
use time::OffsetDateTime;
use uuid::Uuid;

/// Erreurs possibles lors des opérations de stockage
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Interface commune de tous les backends de stockage
pub trait Storage: Send + Sync {
    fn list_servers(&self) -> Result<Vec<Server>, StorageError>;
    fn create_server(&self, server: NewServer) -> Result<Server, StorageError>;
    /// `Ok(None)` si l'id n'existe pas
    fn update_server(&self, id: u64, patch: ServerPatch) -> Result<Option<Server>, StorageError>;
    /// Supprimer un id absent n'est pas une erreur
    fn delete_server(&self, id: u64) -> Result<(), StorageError>;

    /// Tickets triés du plus récent au plus ancien
    fn list_tickets(&self) -> Result<Vec<Ticket>, StorageError>;
    fn create_ticket(&self, ticket: NewTicket) -> Result<Ticket, StorageError>;
    fn update_ticket(&self, id: u64, patch: TicketPatch) -> Result<Option<Ticket>, StorageError>;
    fn delete_ticket(&self, id: u64) -> Result<(), StorageError>;

    /// Les `limit` échantillons les plus récents, du plus récent au plus ancien
    fn recent_network_metrics(&self, limit: usize) -> Result<Vec<NetworkMetric>, StorageError>;
    fn create_network_metric_at(
        &self,
        metric: NewNetworkMetric,
        timestamp: OffsetDateTime,
    ) -> Result<NetworkMetric, StorageError>;

    fn create_network_metric(&self, metric: NewNetworkMetric) -> Result<NetworkMetric, StorageError> {
        self.create_network_metric_at(metric, OffsetDateTime::now_utc())
    }

    fn latest_system_metric(&self) -> Result<Option<SystemMetric>, StorageError>;
    fn create_system_metric(&self, metric: NewSystemMetric) -> Result<SystemMetric, StorageError>;

    fn list_users(&self) -> Result<Vec<User>, StorageError>;
    fn get_user(&self, id: &str) -> Result<Option<User>, StorageError>;
    fn create_user(&self, user: NewUser) -> Result<User, StorageError>;
    fn update_user(&self, id: &str, patch: UserPatch) -> Result<Option<User>, StorageError>;
    fn delete_user(&self, id: &str) -> Result<(), StorageError>;

    /// Crée les réglages par défaut au premier accès
    fn get_settings(&self) -> Result<Settings, StorageError>;
    fn update_settings(&self, patch: SettingsPatch) -> Result<Settings, StorageError>;

    /// Vide toutes les tables et remet les séquences à zéro
    fn clear(&self) -> Result<(), StorageError>;
}

/// Hash salé d'un mot de passe, format `salt:sha256hex`
pub fn hash_password(password: &str) -> String {
    let salt = Uuid::new_v4().simple().to_string();
    let digest = digest_with_salt(&salt, password);
    format!("{salt}:{digest}")
}

#[cfg(test)]
pub fn verify_password(stored: &str, candidate: &str) -> bool {
    match stored.split_once(':') {
        Some((salt, digest)) => digest_with_salt(salt, candidate) == digest,
        None => false,
    }
}

fn digest_with_salt(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_hash_roundtrip() {
        let stored = hash_password("admin123");
        assert!(stored.contains(':'));
        assert!(!stored.contains("admin123"));
        assert!(verify_password(&stored, "admin123"));
        assert!(!verify_password(&stored, "wrong"));
    }

    #[test]
    fn test_password_hash_is_salted() {
        assert_ne!(hash_password("same"), hash_password("same"));
        assert!(!verify_password("no-separator", "same"));
    }
}
