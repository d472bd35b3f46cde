use crate::config::Config;
use crate::domain::attendance_window::AttendanceSettings;
use crate::domain::settings::attendance_from_rows;
use moka::future::Cache;
use sqlx::MySqlPool;
use std::sync::Arc;
use std::time::Duration;

const ATTENDANCE_KEY: &str = "attendance";

/// Attendance settings are read on every check-in; keep them in memory for a short TTL.
#[derive(Clone)]
pub struct SettingsCache {
    cache: Cache<&'static str, AttendanceSettings>,
    defaults: AttendanceSettings,
}

impl SettingsCache {
    pub fn from_config(config: &Config) -> Self {
        Self {
            cache: Cache::builder()
                .max_capacity(16)
                .time_to_live(Duration::from_secs(config.settings_cache_ttl_secs))
                .build(),
            defaults: AttendanceSettings {
                work_start: config.default_work_start,
                work_end: config.default_work_end,
                late_grace_minutes: config.default_late_grace_minutes,
                checkin_open_before_minutes: config.default_checkin_open_before_minutes,
            },
        }
    }

    pub async fn attendance(&self, pool: &MySqlPool) -> Result<AttendanceSettings, Arc<sqlx::Error>> {
        let defaults = self.defaults.clone();
        self.cache
            .try_get_with(ATTENDANCE_KEY, async move {
                let rows = sqlx::query_as::<_, (String, String)>(
                    "SELECT setting_key, setting_value FROM general_settings",
                )
                .fetch_all(pool)
                .await?;

                let settings = attendance_from_rows(&defaults, &rows);
                log::debug!("Attendance settings loaded: {:?}", settings);
                Ok::<_, sqlx::Error>(settings)
            })
            .await
    }

    pub async fn invalidate(&self) {
        self.cache.invalidate(ATTENDANCE_KEY).await;
    }

    pub fn defaults(&self) -> &AttendanceSettings {
        &self.defaults
    }
}
