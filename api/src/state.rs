use sqlx::PgPool;

use crate::auth::IdentityClient;
use crate::inference::ReplicateClient;

#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub identity: IdentityClient,
    pub replicate: ReplicateClient,
}
