/*
 * Responsibility
 * - Token gate decision logic (auth)
 * - Service registry lookup (discovery)
 * - Introspection result cache backends (cache)
 */
pub mod auth;
pub mod cache;
pub mod discovery;
