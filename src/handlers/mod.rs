// Handlers grouped by surface:
// root   - greeting and health (public)
// users  - user CRUD and avatar upload (optionally behind basic auth)
// access - bearer-protected probes, some gated on a realm role
pub mod access;
pub mod root;
pub mod users;
