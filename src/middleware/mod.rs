/*
 * Responsibility
 * - Public interface of the middleware layer (re-export)
 * - http::apply (request id / trace / limits), auth::gate::apply (token gate)
 */
pub mod auth;
pub mod http;
