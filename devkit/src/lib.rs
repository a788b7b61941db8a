/*!
# Command Center DevKit - Stubs et utilitaires de test

Bibliothèque facilitant les tests du kernel Command Center avec:
- Stub HTTP des trois sources externes (régions, méta réseau, rate limit)
- Payloads amont et corps de requêtes API prêts à l'emploi
- Attente active bornée pour les tâches de fond
*/

pub mod fixtures;
pub mod test_utils;
pub mod upstream_stub;

pub use test_utils::{init_test_logging, wait_until};
pub use upstream_stub::{StubBehavior, UpstreamRoute, UpstreamStub};
