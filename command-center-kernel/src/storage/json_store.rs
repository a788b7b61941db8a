/**
 * JSON STORE - Stockage durable des tables dans un fichier JSON unique
 *
 * FONCTIONNEMENT :
 * - Toutes les tables + leurs séquences d'id dans un seul document
 * - Copie en mémoire derrière un mutex, réécriture du fichier après chaque mutation
 * - Une mutation n'est visible en mémoire qu'une fois le fichier écrit
 * - Écriture via fichier temporaire + rename (jamais de fichier tronqué)
 * - Mode mémoire pure (sans fichier) pour les tests
 *
 * CONTRAINTES : serverId, ticketId et username sont uniques (Conflict sinon).
 */

use super::{hash_password, Storage, StorageError};
use crate::models::{
    NetworkMetric, NewNetworkMetric, NewServer, NewSystemMetric, NewTicket, NewUser, Server,
    ServerPatch, Settings, SettingsPatch, SystemMetric, Ticket, TicketPatch, User, UserPatch,
    DEFAULT_SERVER_NAME,
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use time::OffsetDateTime;
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct Tables {
    servers: Vec<Server>,
    tickets: Vec<Ticket>,
    network_metrics: Vec<NetworkMetric>,
    system_metrics: Vec<SystemMetric>,
    users: Vec<User>,
    settings: Option<Settings>,
    sequences: Sequences,
}

/// Dernier id attribué par table (les ids supprimés ne sont jamais réutilisés)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct Sequences {
    servers: u64,
    tickets: u64,
    network_metrics: u64,
    system_metrics: u64,
}

fn next_id(counter: &mut u64) -> u64 {
    *counter += 1;
    *counter
}

pub struct JsonStore {
    /// Chemin du fichier de stockage (None = mémoire uniquement)
    storage_path: Option<PathBuf>,
    tables: Mutex<Tables>,
}

impl JsonStore {
    /// Ouvre (ou crée) le fichier de stockage
    pub fn open<P: Into<PathBuf>>(storage_path: P) -> Result<Self, StorageError> {
        let path = storage_path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let tables = if path.exists() {
            let content = fs::read_to_string(&path)?;
            if content.trim().is_empty() {
                Tables::default()
            } else {
                serde_json::from_str(&content)?
            }
        } else {
            Tables::default()
        };

        let store = Self {
            storage_path: Some(path.clone()),
            tables: Mutex::new(tables),
        };
        store.persist(&store.tables.lock())?;
        info!("[storage] json store opened at {:?}", path);
        Ok(store)
    }

    #[cfg(test)]
    pub fn in_memory() -> Self {
        Self {
            storage_path: None,
            tables: Mutex::new(Tables::default()),
        }
    }

    // Écriture synchrone sous le verrou : document petit, une écriture par requête.
    // TODO: passer par spawn_blocking si les métriques réseau stockées grossissent.
    fn persist(&self, tables: &Tables) -> Result<(), StorageError> {
        if let Some(path) = &self.storage_path {
            let json = serde_json::to_string_pretty(tables)?;
            let tmp = path.with_extension("json.tmp");
            fs::write(&tmp, json)?;
            fs::rename(&tmp, path)?;
        }
        Ok(())
    }

    /// Applique la mutation sur une copie, écrit le fichier, puis remplace l'état en mémoire
    fn mutate<R>(&self, f: impl FnOnce(&mut Tables) -> Result<R, StorageError>) -> Result<R, StorageError> {
        let mut tables = self.tables.lock();
        let mut draft = tables.clone();
        let result = f(&mut draft)?;
        self.persist(&draft)?;
        *tables = draft;
        Ok(result)
    }

    fn read<R>(&self, f: impl FnOnce(&Tables) -> R) -> Result<R, StorageError> {
        Ok(f(&self.tables.lock()))
    }
}

fn ensure_unique_server_id(servers: &[Server], server_id: &str, except: Option<u64>) -> Result<(), StorageError> {
    if servers.iter().any(|s| s.server_id == server_id && Some(s.id) != except) {
        return Err(StorageError::Conflict(format!("serverId {server_id} already exists")));
    }
    Ok(())
}

fn ensure_unique_ticket_id(tickets: &[Ticket], ticket_id: &str, except: Option<u64>) -> Result<(), StorageError> {
    if tickets.iter().any(|t| t.ticket_id == ticket_id && Some(t.id) != except) {
        return Err(StorageError::Conflict(format!("ticketId {ticket_id} already exists")));
    }
    Ok(())
}

fn ensure_unique_username(users: &[User], username: &str, except: Option<&str>) -> Result<(), StorageError> {
    if users.iter().any(|u| u.username == username && Some(u.id.as_str()) != except) {
        return Err(StorageError::Conflict(format!("username {username} already exists")));
    }
    Ok(())
}

impl Storage for JsonStore {
    fn list_servers(&self) -> Result<Vec<Server>, StorageError> {
        self.read(|t| t.servers.clone())
    }

    fn create_server(&self, server: NewServer) -> Result<Server, StorageError> {
        self.mutate(|t| {
            ensure_unique_server_id(&t.servers, &server.server_id, None)?;
            let created = Server {
                id: next_id(&mut t.sequences.servers),
                server_id: server.server_id,
                name: Some(server.name.unwrap_or_else(|| DEFAULT_SERVER_NAME.to_string())),
                region: server.region,
                status: server.status,
                load: server.load,
            };
            t.servers.push(created.clone());
            debug!("[storage] created server {} ({})", created.id, created.server_id);
            Ok(created)
        })
    }

    fn update_server(&self, id: u64, patch: ServerPatch) -> Result<Option<Server>, StorageError> {
        self.mutate(|t| {
            if let Some(server_id) = &patch.server_id {
                ensure_unique_server_id(&t.servers, server_id, Some(id))?;
            }
            let Some(server) = t.servers.iter_mut().find(|s| s.id == id) else {
                return Ok(None);
            };
            patch.apply(server);
            Ok(Some(server.clone()))
        })
    }

    fn delete_server(&self, id: u64) -> Result<(), StorageError> {
        self.mutate(|t| {
            t.servers.retain(|s| s.id != id);
            Ok(())
        })
    }

    fn list_tickets(&self) -> Result<Vec<Ticket>, StorageError> {
        self.read(|t| {
            let mut tickets = t.tickets.clone();
            tickets.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
            tickets
        })
    }

    fn create_ticket(&self, ticket: NewTicket) -> Result<Ticket, StorageError> {
        self.mutate(|t| {
            ensure_unique_ticket_id(&t.tickets, &ticket.ticket_id, None)?;
            let created = Ticket {
                id: next_id(&mut t.sequences.tickets),
                ticket_id: ticket.ticket_id,
                subject: ticket.subject,
                status: ticket.status,
                priority: ticket.priority,
                created_at: OffsetDateTime::now_utc(),
            };
            t.tickets.push(created.clone());
            Ok(created)
        })
    }

    fn update_ticket(&self, id: u64, patch: TicketPatch) -> Result<Option<Ticket>, StorageError> {
        self.mutate(|t| {
            if let Some(ticket_id) = &patch.ticket_id {
                ensure_unique_ticket_id(&t.tickets, ticket_id, Some(id))?;
            }
            let Some(ticket) = t.tickets.iter_mut().find(|tk| tk.id == id) else {
                return Ok(None);
            };
            patch.apply(ticket);
            Ok(Some(ticket.clone()))
        })
    }

    fn delete_ticket(&self, id: u64) -> Result<(), StorageError> {
        self.mutate(|t| {
            t.tickets.retain(|tk| tk.id != id);
            Ok(())
        })
    }

    fn recent_network_metrics(&self, limit: usize) -> Result<Vec<NetworkMetric>, StorageError> {
        self.read(|t| {
            let mut metrics = t.network_metrics.clone();
            metrics.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));
            metrics.truncate(limit);
            metrics
        })
    }

    fn create_network_metric_at(
        &self,
        metric: NewNetworkMetric,
        timestamp: OffsetDateTime,
    ) -> Result<NetworkMetric, StorageError> {
        self.mutate(|t| {
            let created = NetworkMetric {
                id: next_id(&mut t.sequences.network_metrics),
                timestamp,
                inbound: metric.inbound,
                outbound: metric.outbound,
                asn: metric.asn,
                country: metric.country,
                city: metric.city,
            };
            t.network_metrics.push(created.clone());
            Ok(created)
        })
    }

    fn latest_system_metric(&self) -> Result<Option<SystemMetric>, StorageError> {
        self.read(|t| {
            t.system_metrics
                .iter()
                .max_by(|a, b| a.timestamp.cmp(&b.timestamp).then(a.id.cmp(&b.id)))
                .cloned()
        })
    }

    fn create_system_metric(&self, metric: NewSystemMetric) -> Result<SystemMetric, StorageError> {
        self.mutate(|t| {
            let created = SystemMetric {
                id: next_id(&mut t.sequences.system_metrics),
                cpu_usage: metric.cpu_usage,
                memory_usage: metric.memory_usage,
                active_nodes: metric.active_nodes,
                total_nodes: metric.total_nodes,
                network_throughput: metric.network_throughput,
                timestamp: OffsetDateTime::now_utc(),
            };
            t.system_metrics.push(created.clone());
            Ok(created)
        })
    }

    fn list_users(&self) -> Result<Vec<User>, StorageError> {
        self.read(|t| t.users.clone())
    }

    fn get_user(&self, id: &str) -> Result<Option<User>, StorageError> {
        self.read(|t| t.users.iter().find(|u| u.id == id).cloned())
    }

    fn create_user(&self, user: NewUser) -> Result<User, StorageError> {
        self.mutate(|t| {
            ensure_unique_username(&t.users, &user.username, None)?;
            let created = User {
                id: Uuid::new_v4().to_string(),
                username: user.username,
                password: hash_password(&user.password),
            };
            t.users.push(created.clone());
            Ok(created)
        })
    }

    fn update_user(&self, id: &str, patch: UserPatch) -> Result<Option<User>, StorageError> {
        self.mutate(|t| {
            if let Some(username) = &patch.username {
                ensure_unique_username(&t.users, username, Some(id))?;
            }
            let Some(user) = t.users.iter_mut().find(|u| u.id == id) else {
                return Ok(None);
            };
            if let Some(username) = patch.username {
                user.username = username;
            }
            if let Some(password) = patch.password {
                user.password = hash_password(&password);
            }
            Ok(Some(user.clone()))
        })
    }

    fn delete_user(&self, id: &str) -> Result<(), StorageError> {
        self.mutate(|t| {
            t.users.retain(|u| u.id != id);
            Ok(())
        })
    }

    fn get_settings(&self) -> Result<Settings, StorageError> {
        if let Some(settings) = self.read(|t| t.settings.clone())? {
            return Ok(settings);
        }
        self.mutate(|t| Ok(t.settings.get_or_insert_with(Settings::default).clone()))
    }

    fn update_settings(&self, patch: SettingsPatch) -> Result<Settings, StorageError> {
        self.mutate(|t| {
            let settings = t.settings.get_or_insert_with(Settings::default);
            patch.apply(settings);
            Ok(settings.clone())
        })
    }

    fn clear(&self) -> Result<(), StorageError> {
        self.mutate(|t| {
            *t = Tables::default();
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ServerStatus, TicketPriority, TicketStatus};
    use crate::storage::verify_password;

    fn new_server(server_id: &str) -> NewServer {
        NewServer {
            server_id: server_id.into(),
            name: None,
            region: "us-east-1".into(),
            status: ServerStatus::Healthy,
            load: 10,
        }
    }

    #[test]
    fn test_server_crud() {
        let store = JsonStore::in_memory();
        let created = store.create_server(new_server("X1")).unwrap();
        assert_eq!(created.id, 1);
        assert_eq!(created.name.as_deref(), Some(DEFAULT_SERVER_NAME));

        let patch = ServerPatch { status: Some(ServerStatus::Critical), load: Some(95), ..Default::default() };
        let updated = store.update_server(created.id, patch).unwrap().unwrap();
        assert_eq!(updated.status, ServerStatus::Critical);
        assert_eq!(updated.load, 95);
        assert_eq!(store.list_servers().unwrap(), vec![updated]);

        assert!(store.update_server(42, ServerPatch { load: Some(1), ..Default::default() }).unwrap().is_none());

        store.delete_server(created.id).unwrap();
        assert!(store.list_servers().unwrap().is_empty());
        // suppression idempotente
        store.delete_server(created.id).unwrap();
    }

    #[test]
    fn test_server_id_is_unique() {
        let store = JsonStore::in_memory();
        store.create_server(new_server("X1")).unwrap();
        let second = store.create_server(new_server("X2")).unwrap();
        assert!(matches!(store.create_server(new_server("X1")), Err(StorageError::Conflict(_))));

        let rename = ServerPatch { server_id: Some("X1".into()), ..Default::default() };
        assert!(matches!(store.update_server(second.id, rename), Err(StorageError::Conflict(_))));
    }

    #[test]
    fn test_ids_are_not_reused_after_delete() {
        let store = JsonStore::in_memory();
        let first = store.create_server(new_server("A")).unwrap();
        store.delete_server(first.id).unwrap();
        let second = store.create_server(new_server("B")).unwrap();
        assert_eq!(second.id, 2);
    }

    #[test]
    fn test_tickets_newest_first() {
        let store = JsonStore::in_memory();
        for id in ["TIK-1", "TIK-2", "TIK-3"] {
            store
                .create_ticket(NewTicket {
                    ticket_id: id.into(),
                    subject: "VPN".into(),
                    status: TicketStatus::Open,
                    priority: TicketPriority::High,
                })
                .unwrap();
        }
        let tickets = store.list_tickets().unwrap();
        let ids: Vec<&str> = tickets.iter().map(|t| t.ticket_id.as_str()).collect();
        assert_eq!(ids, vec!["TIK-3", "TIK-2", "TIK-1"]);
    }

    #[test]
    fn test_recent_network_metrics_limit_and_order() {
        let store = JsonStore::in_memory();
        let now = OffsetDateTime::now_utc();
        for i in 0..5i64 {
            let metric = NewNetworkMetric { inbound: i as f64, outbound: 0.0, asn: None, country: None, city: None };
            store.create_network_metric_at(metric, now - time::Duration::minutes(i)).unwrap();
        }
        let recent = store.recent_network_metrics(3).unwrap();
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].inbound, 0.0);
        assert!(recent[0].timestamp > recent[1].timestamp);
    }

    #[test]
    fn test_latest_system_metric() {
        let store = JsonStore::in_memory();
        assert!(store.latest_system_metric().unwrap().is_none());
        for cpu in [10.0, 20.0] {
            store
                .create_system_metric(NewSystemMetric {
                    cpu_usage: cpu,
                    memory_usage: 5.0,
                    active_nodes: 1,
                    total_nodes: 2,
                    network_throughput: 1.0,
                })
                .unwrap();
        }
        assert_eq!(store.latest_system_metric().unwrap().unwrap().cpu_usage, 20.0);
    }

    #[test]
    fn test_users_hash_passwords() {
        let store = JsonStore::in_memory();
        let user = store.create_user(NewUser { username: "admin".into(), password: "admin123".into() }).unwrap();
        assert_ne!(user.password, "admin123");
        assert!(verify_password(&user.password, "admin123"));

        let updated = store
            .update_user(&user.id, UserPatch { password: Some("changeme".into()), ..Default::default() })
            .unwrap()
            .unwrap();
        assert!(verify_password(&updated.password, "changeme"));

        assert!(matches!(
            store.create_user(NewUser { username: "admin".into(), password: "x".into() }),
            Err(StorageError::Conflict(_))
        ));

        store.delete_user(&user.id).unwrap();
        assert!(store.get_user(&user.id).unwrap().is_none());
    }

    #[test]
    fn test_settings_defaults_then_patch() {
        let store = JsonStore::in_memory();
        assert_eq!(store.get_settings().unwrap(), Settings::default());
        let patched = store
            .update_settings(SettingsPatch { maintenance_mode: Some(true), ..Default::default() })
            .unwrap();
        assert!(patched.maintenance_mode);
        assert_eq!(patched.theme, "system");
    }

    #[test]
    fn test_file_persistence_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("store.json");
        {
            let store = JsonStore::open(&path).unwrap();
            store.create_server(new_server("X1")).unwrap();
            store.update_settings(SettingsPatch { theme: Some("dark".into()), ..Default::default() }).unwrap();
        }
        let reopened = JsonStore::open(&path).unwrap();
        let servers = reopened.list_servers().unwrap();
        assert_eq!(servers.len(), 1);
        assert_eq!(servers[0].server_id, "X1");
        assert_eq!(reopened.get_settings().unwrap().theme, "dark");
        // la séquence survit au rechargement
        assert_eq!(reopened.create_server(new_server("X2")).unwrap().id, 2);
    }

    #[test]
    fn test_failed_write_leaves_store_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().join("data");
        let path = data_dir.join("store.json");
        let store = JsonStore::open(&path).unwrap();
        store.create_server(new_server("X1")).unwrap();

        fs::remove_dir_all(&data_dir).unwrap();
        assert!(matches!(store.create_server(new_server("X2")), Err(StorageError::Io(_))));
        let ids: Vec<String> = store.list_servers().unwrap().into_iter().map(|s| s.server_id).collect();
        assert_eq!(ids, vec!["X1"]);

        // la séquence n'a pas avancé non plus
        fs::create_dir_all(&data_dir).unwrap();
        assert_eq!(store.create_server(new_server("X3")).unwrap().id, 2);
        let reopened = JsonStore::open(&path).unwrap();
        assert_eq!(reopened.list_servers().unwrap().len(), 2);
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn test_clear_resets_everything() {
        let store = JsonStore::in_memory();
        store.create_server(new_server("X1")).unwrap();
        store.clear().unwrap();
        assert!(store.list_servers().unwrap().is_empty());
        assert_eq!(store.create_server(new_server("X1")).unwrap().id, 1);
    }
}
