use crate::{
    api::{
        asset, attendance, challenge, employee, evaluation, evening_schedule, events,
        leave_request, live_match, message, news, notification, report, setting,
    },
    auth::{handlers, middleware::auth_middleware},
    config::Config,
    error::ApiError,
};
use actix_governor::{
    Governor, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::{middleware::from_fn, web};
use std::sync::Arc;

/// Malformed JSON bodies answer with the same `{"message"}` shape as every other error.
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(256 * 1024)
        .error_handler(|err, _req| ApiError::bad_request(err.to_string()).into())
}

fn query_config() -> web::QueryConfig {
    web::QueryConfig::default()
        .error_handler(|err, _req| ApiError::bad_request(err.to_string()).into())
}

pub fn configure(cfg: &mut web::ServiceConfig, config: Config) {
    // Helper to build per-route limiter
    fn build_limiter(requests_per_min: u32) -> Governor<PeerIpKeyExtractor, NoOpMiddleware> {
        let requests_per_min = requests_per_min.max(1);
        let per_ms = (60_000 / requests_per_min as u64).max(1);
        let cfg = GovernorConfigBuilder::default()
            .per_millisecond(per_ms)
            .burst_size(requests_per_min)
            .key_extractor(PeerIpKeyExtractor)
            .finish()
            .expect("limiter period and burst are non-zero");
        Governor::new(&cfg)
    }

    let login_limiter = Arc::new(build_limiter(config.rate_login_per_min));
    let refresh_limiter = Arc::new(build_limiter(config.rate_refresh_per_min));
    let protected_limiter = Arc::new(build_limiter(config.rate_protected_per_min));

    cfg.app_data(json_config()).app_data(query_config());

    // Public routes
    cfg.service(
        web::scope("/auth")
            .service(
                web::resource("/login")
                    .wrap(login_limiter.clone())
                    .route(web::post().to(handlers::login)),
            )
            .service(
                web::resource("/refresh")
                    .wrap(refresh_limiter.clone())
                    .route(web::post().to(handlers::refresh_token)),
            )
            .service(
                web::resource("/logout")
                    .wrap(refresh_limiter)
                    .route(web::post().to(handlers::logout)),
            ),
    );

    // Protected routes
    cfg.service(
        web::scope(&config.api_prefix)
            .wrap(from_fn(auth_middleware)) // authentication
            .wrap(protected_limiter) // rate limiting
            .route("/me", web::get().to(handlers::me))
            .route("/events", web::get().to(events::events))
            .service(
                web::scope("/employee")
                    // /employee
                    .service(
                        web::resource("")
                            .route(web::post().to(employee::create_employee))
                            .route(web::get().to(employee::list_employees)),
                    )
                    // /employee/{id}
                    .service(
                        web::resource("/{id}")
                            .route(web::put().to(employee::update_employee))
                            .route(web::get().to(employee::get_employee))
                            .route(web::delete().to(employee::delete_employee)),
                    ),
            )
            .service(
                web::scope("/attendance")
                    // /attendance
                    .service(web::resource("").route(web::get().to(attendance::timesheet)))
                    .service(
                        web::resource("/check-in").route(web::post().to(attendance::check_in)),
                    )
                    .service(
                        web::resource("/check-out").route(web::post().to(attendance::check_out)),
                    )
                    // /attendance/{id}
                    .service(
                        web::resource("/{id}")
                            .route(web::put().to(attendance::correct_attendance)),
                    ),
            )
            .service(
                web::scope("/leave")
                    // /leave
                    .service(
                        web::resource("")
                            .route(web::get().to(leave_request::leave_list))
                            .route(web::post().to(leave_request::create_leave)),
                    )
                    // /leave/{id}
                    .service(web::resource("/{id}").route(web::get().to(leave_request::get_leave)))
                    .service(
                        web::resource("/{id}/approve")
                            .route(web::put().to(leave_request::approve_leave)),
                    )
                    .service(
                        web::resource("/{id}/reject")
                            .route(web::put().to(leave_request::reject_leave)),
                    )
                    .service(
                        web::resource("/{id}/cancel")
                            .route(web::put().to(leave_request::cancel_leave)),
                    ),
            )
            .service(
                web::scope("/evaluations")
                    .service(
                        web::resource("")
                            .route(web::post().to(evaluation::create_evaluation))
                            .route(web::get().to(evaluation::list_evaluations)),
                    )
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(evaluation::get_evaluation))
                            .route(web::delete().to(evaluation::delete_evaluation)),
                    ),
            )
            .service(
                web::scope("/messages")
                    .service(web::resource("").route(web::post().to(message::send_message)))
                    .service(web::resource("/inbox").route(web::get().to(message::inbox)))
                    .service(web::resource("/sent").route(web::get().to(message::sent)))
                    .service(
                        web::resource("/unread-count").route(web::get().to(message::unread_count)),
                    )
                    .service(web::resource("/{id}/read").route(web::put().to(message::mark_read)))
                    .service(
                        web::resource("/{id}").route(web::delete().to(message::delete_message)),
                    ),
            )
            .service(
                web::scope("/news")
                    .service(
                        web::resource("")
                            .route(web::post().to(news::create_news))
                            .route(web::get().to(news::list_news)),
                    )
                    .service(
                        web::resource("/{id}")
                            .route(web::put().to(news::update_news))
                            .route(web::delete().to(news::delete_news)),
                    ),
            )
            .service(
                web::scope("/assets")
                    .service(
                        web::resource("")
                            .route(web::post().to(asset::create_asset))
                            .route(web::get().to(asset::list_assets)),
                    )
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(asset::get_asset))
                            .route(web::put().to(asset::update_asset))
                            .route(web::delete().to(asset::delete_asset)),
                    )
                    .service(web::resource("/{id}/assign").route(web::put().to(asset::assign_asset)))
                    .service(web::resource("/{id}/return").route(web::put().to(asset::return_asset))),
            )
            .service(
                web::scope("/evening-schedules")
                    .service(
                        web::resource("")
                            .route(web::post().to(evening_schedule::create_schedule))
                            .route(web::get().to(evening_schedule::list_schedules)),
                    )
                    .service(
                        web::resource("/{id}")
                            .route(web::delete().to(evening_schedule::delete_schedule)),
                    ),
            )
            .service(
                web::scope("/matches")
                    .service(web::resource("").route(web::post().to(live_match::create_match)))
                    // fixed segments before /{id}
                    .service(web::resource("/open").route(web::get().to(live_match::open_matches)))
                    .service(web::resource("/mine").route(web::get().to(live_match::my_matches)))
                    .service(web::resource("/{id}").route(web::get().to(live_match::get_match)))
                    .service(web::resource("/{id}/join").route(web::put().to(live_match::join_match)))
                    .service(web::resource("/{id}/move").route(web::put().to(live_match::make_move)))
                    .service(
                        web::resource("/{id}/forfeit")
                            .route(web::put().to(live_match::forfeit_match)),
                    ),
            )
            .service(
                web::scope("/challenges")
                    .service(web::resource("").route(web::post().to(challenge::create_challenge)))
                    .service(
                        web::resource("/today/start").route(web::post().to(challenge::start_today)),
                    )
                    .service(
                        web::resource("/today/answer")
                            .route(web::post().to(challenge::answer_today)),
                    )
                    .service(
                        web::resource("/leaderboard").route(web::get().to(challenge::leaderboard)),
                    ),
            )
            .service(
                web::scope("/notifications")
                    .service(
                        web::resource("/subscribe")
                            .route(web::post().to(notification::subscribe))
                            .route(web::delete().to(notification::unsubscribe)),
                    )
                    .service(
                        web::resource("/dispatch").route(web::post().to(notification::dispatch)),
                    ),
            )
            .service(
                web::resource("/settings")
                    .route(web::get().to(setting::get_settings))
                    .route(web::put().to(setting::update_settings)),
            )
            .service(
                web::scope("/reports")
                    .service(
                        web::resource("/timesheet").route(web::get().to(report::timesheet_report)),
                    )
                    .service(web::resource("/leave/{id}").route(web::get().to(report::leave_report)))
                    .service(web::resource("/badge/{id}").route(web::get().to(report::badge_report))),
            ),
    );
}

// LOGIN
//  ├─ access_token (15 min)
//  └─ refresh_token (7 days)

// API REQUEST
//  └─ Authorization: Bearer access_token

// ACCESS EXPIRED
//  └─ POST /auth/refresh with refresh_token
//       └─ returns new access_token

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_support::{bearer, test_app};
    use crate::model::role::Role;
    use actix_web::{http::StatusCode, test as actix_test};
    use serde_json::{Value, json};
    use std::net::SocketAddr;

    fn peer() -> SocketAddr {
        "127.0.0.1:40000".parse().unwrap()
    }

    #[actix_web::test]
    async fn protected_scope_requires_bearer_token() {
        let app = test_app!(|cfg| configure(cfg, Config::for_tests()));

        let req = actix_test::TestRequest::get()
            .uri("/api/employee")
            .peer_addr(peer())
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let body: Value = actix_test::read_body_json(resp).await;
        assert_eq!(body["message"], "Missing Authorization header");
    }

    #[actix_web::test]
    async fn malformed_json_gets_a_message_body() {
        let app = test_app!(|cfg| configure(cfg, Config::for_tests()));

        let req = actix_test::TestRequest::post()
            .uri("/auth/login")
            .peer_addr(peer())
            .insert_header(("Content-Type", "application/json"))
            .set_payload("{not json")
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let body: Value = actix_test::read_body_json(resp).await;
        assert!(body["message"].is_string());
    }

    #[actix_web::test]
    async fn role_guard_applies_behind_the_middleware() {
        let app = test_app!(|cfg| configure(cfg, Config::for_tests()));

        let req = actix_test::TestRequest::put()
            .uri("/api/settings")
            .peer_addr(peer())
            .insert_header(bearer(12, Role::Employee))
            .set_json(json!({ "work_start": "09:00" }))
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }
}
