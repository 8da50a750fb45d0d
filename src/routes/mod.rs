pub mod health;
pub mod generations;
pub mod stats;

use actix_web::web;

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .service(health::health_check)
            .configure(generations::generations_routes)
            .configure(stats::stats_routes)
    );
}
