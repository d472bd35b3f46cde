//! Shared fixtures for handler tests. The pool is lazy, so only paths that
//! resolve before a query runs can be exercised without a database.

use crate::auth::jwt::generate_access_token;
use crate::config::Config;
use crate::model::role::Role;

pub fn bearer(employee_id: u64, role: Role) -> (&'static str, String) {
    let config = Config::for_tests();
    let token = generate_access_token(
        employee_id,
        format!("EMP-{employee_id:03}"),
        role.id(),
        &config.jwt_secret,
        60,
    )
    .expect("sign test token");
    ("Authorization", format!("Bearer {token}"))
}

macro_rules! test_app {
    ($configure:expr) => {{
        let config = crate::config::Config::for_tests();
        actix_web::test::init_service(
            actix_web::App::new()
                .app_data(crate::routes::json_config())
                .app_data(actix_web::web::Data::new(crate::db::lazy_pool()))
                .app_data(actix_web::web::Data::new(
                    crate::utils::settings_cache::SettingsCache::from_config(&config),
                ))
                .app_data(actix_web::web::Data::new(
                    crate::utils::change_feed::ChangeFeed::new(16),
                ))
                .app_data(actix_web::web::Data::new(
                    crate::notify::push::PushDispatcher::new(std::sync::Arc::new(
                        crate::notify::push::DisabledSender,
                    )),
                ))
                .app_data(actix_web::web::Data::new(config))
                .configure($configure),
        )
        .await
    }};
}

pub(crate) use test_app;
