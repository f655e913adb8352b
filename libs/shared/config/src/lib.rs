use std::env;
use std::str::FromStr;
use tracing::warn;

/// Where appointments and directories live. `Supabase` needs the schema in
/// `libs/appointment-cell/migrations/0001_scheduling_schema.sql` applied first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Memory,
    Supabase,
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "memory" | "in_memory" | "in-memory" => Ok(StorageBackend::Memory),
            "supabase" | "postgrest" => Ok(StorageBackend::Supabase),
            other => Err(format!("unknown storage backend: {}", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_service_role_key: String,
    pub supabase_jwt_secret: String,
    pub storage_backend: StorageBackend,
    pub directory_seed_path: Option<String>,
    pub server_port: u16,
    pub scheduling: SchedulingSettings,
}

/// Slot grid and maintenance cadence, as read from the environment.
#[derive(Debug, Clone, PartialEq)]
pub struct SchedulingSettings {
    pub horizon_days: u32,
    pub day_start_hour: u32,
    pub day_end_hour: u32,
    pub slot_minutes: u32,
    pub include_today: bool,
    pub utc_offset_minutes: i32,
    pub generation_interval_secs: u64,
    pub sweep_interval_secs: u64,
    pub generate_on_startup: bool,
}

impl Default for SchedulingSettings {
    fn default() -> Self {
        Self {
            horizon_days: 7,
            day_start_hour: 8,
            day_end_hour: 15,
            slot_minutes: 30,
            include_today: false,
            utc_offset_minutes: 0,
            generation_interval_secs: 86_400,
            sweep_interval_secs: 600,
            generate_on_startup: true,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let defaults = SchedulingSettings::default();

        let config = Self {
            supabase_url: env::var("SUPABASE_URL")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_URL not set, using empty value");
                    String::new()
                }),
            supabase_anon_key: env::var("SUPABASE_ANON_PUBLIC_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_ANON_PUBLIC_KEY not set, using empty value");
                    String::new()
                }),
            supabase_service_role_key: env::var("SUPABASE_SERVICE_ROLE_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_SERVICE_ROLE_KEY not set, using empty value");
                    String::new()
                }),
            supabase_jwt_secret: env::var("SUPABASE_JWT_SECRET")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_JWT_SECRET not set, using empty value");
                    String::new()
                }),
            storage_backend: parse_var("STORAGE_BACKEND", StorageBackend::Memory),
            directory_seed_path: env::var("DIRECTORY_SEED_PATH").ok(),
            server_port: parse_var("SERVER_PORT", 3000),
            scheduling: SchedulingSettings {
                horizon_days: parse_var("SLOT_HORIZON_DAYS", defaults.horizon_days),
                day_start_hour: parse_var("SLOT_DAY_START_HOUR", defaults.day_start_hour),
                day_end_hour: parse_var("SLOT_DAY_END_HOUR", defaults.day_end_hour),
                slot_minutes: parse_var("SLOT_MINUTES", defaults.slot_minutes),
                include_today: parse_var("SLOT_INCLUDE_TODAY", defaults.include_today),
                utc_offset_minutes: parse_var("CLINIC_UTC_OFFSET_MINUTES", defaults.utc_offset_minutes),
                generation_interval_secs: parse_var("GENERATION_INTERVAL_SECS", defaults.generation_interval_secs),
                sweep_interval_secs: parse_var("SWEEP_INTERVAL_SECS", defaults.sweep_interval_secs),
                generate_on_startup: parse_var("GENERATE_ON_STARTUP", defaults.generate_on_startup),
            },
        };

        if config.storage_backend == StorageBackend::Supabase && !config.is_configured() {
            warn!("Supabase storage selected but application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.supabase_url.is_empty()
            && !self.supabase_anon_key.is_empty()
            && !self.supabase_jwt_secret.is_empty()
    }

    /// Key used for server-side PostgREST calls; falls back to the anon key.
    pub fn service_key(&self) -> &str {
        if self.supabase_service_role_key.is_empty() {
            &self.supabase_anon_key
        } else {
            &self.supabase_service_role_key
        }
    }
}

fn parse_var<T>(name: &str, default: T) -> T
where
    T: FromStr + std::fmt::Debug,
{
    match env::var(name) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!("{} has invalid value {:?}, using default {:?}", name, raw, default);
            default
        }),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_backend_parses_aliases() {
        assert_eq!("memory".parse::<StorageBackend>(), Ok(StorageBackend::Memory));
        assert_eq!(" Supabase ".parse::<StorageBackend>(), Ok(StorageBackend::Supabase));
        assert!("redis".parse::<StorageBackend>().is_err());
    }

    #[test]
    fn service_key_falls_back_to_anon_key() {
        let mut config = AppConfig {
            supabase_url: "http://localhost:54321".to_string(),
            supabase_anon_key: "anon".to_string(),
            supabase_service_role_key: String::new(),
            supabase_jwt_secret: "secret".to_string(),
            storage_backend: StorageBackend::Memory,
            directory_seed_path: None,
            server_port: 3000,
            scheduling: SchedulingSettings::default(),
        };
        assert_eq!(config.service_key(), "anon");

        config.supabase_service_role_key = "service".to_string();
        assert_eq!(config.service_key(), "service");
    }

    #[test]
    fn default_grid_matches_clinic_hours() {
        let settings = SchedulingSettings::default();
        assert_eq!(settings.horizon_days, 7);
        assert_eq!((settings.day_start_hour, settings.day_end_hour), (8, 15));
        assert_eq!(settings.slot_minutes, 30);
        assert!(!settings.include_today);
    }
}
