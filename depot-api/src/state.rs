use depot_core::LogisticsEngine;
use depot_store::app_config::BusinessRules;

#[derive(Clone)]
pub struct AppState {
    pub engine: LogisticsEngine,
    pub business_rules: BusinessRules,
}
