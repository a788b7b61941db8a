/**
 * SEED - Données de démo du tableau de bord
 *
 * Idempotent : vide toutes les tables avant de réinsérer le jeu de données.
 * Lancement : `command-center-kernel seed`
 */

use super::{Storage, StorageError};
use crate::models::{
    NewNetworkMetric, NewServer, NewSystemMetric, NewTicket, NewUser, ServerStatus, SettingsPatch,
    TicketPriority, TicketStatus,
};
use rand::Rng;
use time::{Duration, OffsetDateTime};
use tracing::info;

const SERVERS: [(&str, &str, &str, ServerStatus, u8); 8] = [
    ("AWS-US-E-1", "US East - Primary", "us-east-1", ServerStatus::Healthy, 45),
    ("AWS-US-E-2", "US East - Secondary", "us-east-1", ServerStatus::Healthy, 52),
    ("AWS-US-W-1", "US West - Core", "us-west-1", ServerStatus::Warning, 88),
    ("GCP-EU-W-1", "EU West - Core", "eu-west-1", ServerStatus::Healthy, 34),
    ("GCP-EU-W-2", "EU West - Backup", "eu-west-1", ServerStatus::Maintenance, 0),
    ("AZ-ASIA-S-1", "Asia South - Core", "ap-south-1", ServerStatus::Critical, 98),
    ("AZ-ASIA-E-1", "Asia East - Core", "ap-east-1", ServerStatus::Healthy, 41),
    ("AWS-SA-E-1", "South America - Core", "sa-east-1", ServerStatus::Healthy, 29),
];

const TICKETS: [(&str, &str, TicketStatus, TicketPriority); 6] = [
    ("TIK-4923", "Printer Config - 2nd Floor", TicketStatus::Resolved, TicketPriority::Low),
    ("TIK-4924", "Email Delivery Delays", TicketStatus::InProgress, TicketPriority::Medium),
    ("TIK-4925", "License Expiry Warning - Jira", TicketStatus::Open, TicketPriority::Medium),
    ("TIK-4926", "New User Provisioning - Marketing", TicketStatus::Resolved, TicketPriority::Low),
    ("TIK-4927", "Database Latency on Node 4", TicketStatus::InProgress, TicketPriority::High),
    ("TIK-4928", "VPN Connection Failure - Remote Team", TicketStatus::Open, TicketPriority::High),
];

const NETWORK_SAMPLES: i64 = 21;
const NETWORK_SAMPLE_SPACING_MINUTES: i64 = 15;

#[derive(Debug, Default, PartialEq)]
pub struct SeedReport {
    pub servers: usize,
    pub tickets: usize,
    pub network_metrics: usize,
    pub system_metrics: usize,
    pub users: usize,
}

pub fn seed_defaults(storage: &dyn Storage) -> Result<SeedReport, StorageError> {
    info!("[seed] seeding database...");
    storage.clear()?;
    let mut report = SeedReport::default();

    for (server_id, name, region, status, load) in SERVERS {
        storage.create_server(NewServer {
            server_id: server_id.into(),
            name: Some(name.into()),
            region: region.into(),
            status,
            load,
        })?;
        report.servers += 1;
    }
    info!("[seed] servers seeded");

    // insérés du plus ancien au plus récent pour que TIK-4928 sorte en tête
    for (ticket_id, subject, status, priority) in TICKETS {
        storage.create_ticket(NewTicket {
            ticket_id: ticket_id.into(),
            subject: subject.into(),
            status,
            priority,
        })?;
        report.tickets += 1;
    }
    info!("[seed] tickets seeded");

    let now = OffsetDateTime::now_utc();
    for i in (0..NETWORK_SAMPLES).rev() {
        let (inbound, outbound) = {
            let mut rng = rand::thread_rng();
            (rng.gen_range(2000.0..7000.0), rng.gen_range(1000.0..4000.0))
        };
        let timestamp = now - Duration::minutes(i * NETWORK_SAMPLE_SPACING_MINUTES);
        storage.create_network_metric_at(
            NewNetworkMetric { inbound, outbound, asn: None, country: None, city: None },
            timestamp,
        )?;
        report.network_metrics += 1;
    }
    info!("[seed] network metrics seeded");

    storage.create_system_metric(NewSystemMetric {
        cpu_usage: 42.5,
        memory_usage: 12.4,
        active_nodes: 84,
        total_nodes: 85,
        network_throughput: 1.2,
    })?;
    report.system_metrics += 1;
    info!("[seed] system metrics seeded");

    for (username, password) in [("admin", "admin123"), ("analyst", "changeme")] {
        storage.create_user(NewUser { username: username.into(), password: password.into() })?;
        report.users += 1;
    }
    info!("[seed] users seeded");

    storage.update_settings(SettingsPatch {
        maintenance_mode: Some(false),
        alert_email: Some("ops@example.com".into()),
        theme: Some("system".into()),
        notifications: Some("all".into()),
    })?;
    info!("[seed] settings seeded");

    Ok(report)
}
