use axum::Router;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::openapi::{OpenApi as OpenApiDoc, Server};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

use crate::authz::Role;
use crate::models;
use crate::routes::{self, auth::MessageResponse, health::HealthResponse};

pub const OPENAPI_PATH: &str = "/api-docs/openapi.json";

#[derive(OpenApi)]
#[openapi(
	paths(
		routes::health::health,
		routes::auth::register,
		routes::auth::register_manager,
		routes::auth::login,
		routes::auth::logout,
		routes::auth::refresh,
		routes::auth::supervise,
		routes::auth::me,
		routes::companies::list_companies,
		routes::companies::create_company,
		routes::companies::get_company,
		routes::companies::update_company,
		routes::companies::delete_company,
		routes::departments::list_departments,
		routes::departments::create_department,
		routes::departments::get_department,
		routes::departments::update_department,
		routes::departments::delete_department,
		routes::purchases::list_purchases,
		routes::purchases::create_purchase,
		routes::purchases::get_purchase,
		routes::purchases::update_purchase,
		routes::purchases::delete_purchase
	),
	components(
		schemas(
			Role,
			HealthResponse,
			MessageResponse,
			models::user::UserDto,
			models::user::RegisterRequest,
			models::user::LoginRequest,
			models::user::TokenPair,
			models::user::RefreshRequest,
			models::user::SupervisorRequest,
			models::user::MeResponse,
			models::company::Company,
			models::company::CompanyWriteRequest,
			models::department::Department,
			models::department::DepartmentWriteRequest,
			models::purchase::Purchase,
			models::purchase::PurchaseWriteRequest
		)
	),
	modifiers(&BearerAuth),
	tags(
		(name = "Health", description = "Liveness"),
		(name = "Auth", description = "Registration, tokens and supervision"),
		(name = "Companies", description = "Companies owned by managers"),
		(name = "Departments", description = "Departments within a company"),
		(name = "Purchases", description = "Purchases within a department")
	)
)]
pub struct ApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
	fn modify(&self, openapi: &mut OpenApiDoc) {
		if let Some(components) = openapi.components.as_mut() {
			components.add_security_scheme(
				"bearerAuth",
				SecurityScheme::Http(
					HttpBuilder::new()
						.scheme(HttpAuthScheme::Bearer)
						.bearer_format("JWT")
						.build(),
				),
			);
		}
	}
}

/// The document with a `servers` entry pointing at the local port.
pub fn build_openapi(port: u16) -> OpenApiDoc {
	let mut doc = ApiDoc::openapi();
	doc.servers = Some(vec![Server::new(format!("http://localhost:{}", port))]);
	doc
}

pub fn swagger_routes(doc: OpenApiDoc) -> Router {
	let swagger_config = utoipa_swagger_ui::Config::new([OPENAPI_PATH])
		.try_it_out_enabled(true)
		.persist_authorization(true);

	Router::new().merge(SwaggerUi::new("/docs").url(OPENAPI_PATH, doc).config(swagger_config))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn document_lists_every_route_and_the_bearer_scheme() {
		let doc = build_openapi(8000);
		let json = serde_json::to_value(&doc).unwrap();

		let paths = json["paths"].as_object().unwrap();
		for path in [
			"/api/health",
			"/api/v1/login",
			"/api/v1/accessToken",
			"/api/v1/supervise/{username}",
			"/api/v1/companies/{company_id}/departments/{department_id}/purchases/{purchase_id}",
		] {
			assert!(paths.contains_key(path), "missing {path}");
		}
		assert_eq!(json["components"]["securitySchemes"]["bearerAuth"]["scheme"], "bearer");
		assert_eq!(json["servers"][0]["url"], "http://localhost:8000");
	}
}
