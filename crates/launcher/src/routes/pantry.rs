//! WisePantry route handlers.
//!
//! Shopping-list operations use HTMX for dynamic updates without full page
//! reloads. Every mutation re-renders the grouped list fragment; failures
//! surface as a short banner while the list stays in its pre-operation
//! state.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::State,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tracing::instrument;

use wise_launcher_core::{ItemId, UserId};

use crate::filters;
use crate::middleware::RequireAuth;
use crate::models::CurrentUser;
use crate::services::pantry::{PantryError, Phase, ShoppingListController, SupermarketGroup};
use crate::state::AppState;
use crate::store::RestItemStore;

/// Degraded-mode banner shown in place of the list.
const UNAVAILABLE_MESSAGE: &str =
    "Services are temporarily unavailable. Please try again later.";

// =============================================================================
// Form Types
// =============================================================================

/// Add item form data.
#[derive(Debug, Deserialize)]
pub struct AddItemForm {
    pub name: String,
    /// Raw quantity text; validated by the controller.
    pub quantity: String,
    #[serde(default)]
    pub supermarket: String,
}

/// Toggle purchased form data.
#[derive(Debug, Deserialize)]
pub struct ToggleForm {
    pub id: String,
}

/// Change quantity form data.
#[derive(Debug, Deserialize)]
pub struct QuantityForm {
    pub id: String,
    pub delta: i64,
}

/// Delete item form data.
#[derive(Debug, Deserialize)]
pub struct DeleteForm {
    pub id: String,
}

// =============================================================================
// Templates
// =============================================================================

/// Pantry page template.
#[derive(Template, WebTemplate)]
#[template(path = "pantry/show.html")]
pub struct PantryTemplate {
    pub groups: Vec<SupermarketGroup>,
    pub error: Option<String>,
    pub user_label: String,
}

/// Grouped-list fragment template (for HTMX).
#[derive(Template, WebTemplate)]
#[template(path = "partials/pantry_groups.html")]
pub struct PantryGroupsTemplate {
    pub groups: Vec<SupermarketGroup>,
    pub error: Option<String>,
}

// =============================================================================
// Mutation Commands
// =============================================================================

/// One list mutation, parsed from its form.
enum Mutation {
    Add {
        name: String,
        quantity: String,
        supermarket: String,
    },
    Toggle(ItemId),
    Quantity(ItemId, i64),
    Delete(ItemId),
}

impl Mutation {
    /// Run the command against the controller; a failure becomes the
    /// banner message.
    async fn apply(
        self,
        pantry: &mut ShoppingListController<RestItemStore>,
    ) -> Option<String> {
        match self {
            Self::Add {
                name,
                quantity,
                supermarket,
            } => pantry
                .add_item(&name, &quantity, &supermarket)
                .await
                .err()
                .map(|e| operation_error(&e, "Could not add item.")),
            Self::Toggle(id) => pantry
                .toggle_purchased(&id)
                .await
                .err()
                .map(|e| operation_error(&e, "Could not update item status.")),
            Self::Quantity(id, delta) => pantry
                .change_quantity(&id, delta)
                .await
                .err()
                .map(|e| operation_error(&e, "Could not update item quantity.")),
            Self::Delete(id) => pantry
                .delete_item(&id)
                .await
                .err()
                .map(|e| operation_error(&e, "Could not delete item.")),
        }
    }
}

/// Short banner for a failed mutation.
///
/// Validation failures carry their field message; store failures get the
/// operation's retryable message.
fn operation_error(error: &PantryError, store_message: &str) -> String {
    if error.is_validation() {
        error.to_string()
    } else {
        store_message.to_string()
    }
}

/// First-touch load of the controller, once the user session is known.
async fn ensure_initialized(
    pantry: &mut ShoppingListController<RestItemStore>,
    uid: &UserId,
) -> Option<String> {
    if pantry.phase() == Phase::Uninitialized {
        if let Err(e) = pantry.initialize(Some(uid.clone())).await {
            tracing::warn!("Initial shopping-list load failed: {e}");
            return Some("Could not fetch shopping items.".to_string());
        }
    }
    None
}

/// Resolve the user's handle, run one mutation under the controller lock,
/// and re-render the grouped list fragment.
async fn run_mutation(state: &AppState, user: &CurrentUser, mutation: Mutation) -> Response {
    let backend = match state.backend() {
        Ok(backend) => backend,
        Err(_) => {
            return PantryGroupsTemplate {
                groups: Vec::new(),
                error: Some(UNAVAILABLE_MESSAGE.to_string()),
            }
            .into_response();
        }
    };

    let handle = state.sessions().get_or_create(backend, user).await;
    let mut pantry = handle.pantry().lock().await;
    let mut error = ensure_initialized(&mut pantry, &user.uid).await;

    if error.is_none() {
        error = mutation.apply(&mut pantry).await;
    }

    PantryGroupsTemplate {
        groups: pantry.grouped_view(),
        error,
    }
    .into_response()
}

// =============================================================================
// Routes
// =============================================================================

/// Display the pantry page.
#[instrument(skip(state, user))]
pub async fn show(State(state): State<AppState>, RequireAuth(user): RequireAuth) -> Response {
    let backend = match state.backend() {
        Ok(backend) => backend,
        Err(_) => {
            return PantryTemplate {
                groups: Vec::new(),
                error: Some(UNAVAILABLE_MESSAGE.to_string()),
                user_label: user.label(),
            }
            .into_response();
        }
    };

    let handle = state.sessions().get_or_create(backend, &user).await;
    let mut pantry = handle.pantry().lock().await;
    let error = ensure_initialized(&mut pantry, &user.uid).await;

    PantryTemplate {
        groups: pantry.grouped_view(),
        error,
        user_label: user.label(),
    }
    .into_response()
}

/// Add an item (HTMX fragment).
#[instrument(skip(state, user, form))]
pub async fn add(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Form(form): Form<AddItemForm>,
) -> Response {
    run_mutation(
        &state,
        &user,
        Mutation::Add {
            name: form.name,
            quantity: form.quantity,
            supermarket: form.supermarket,
        },
    )
    .await
}

/// Toggle an item's purchased flag (HTMX fragment).
#[instrument(skip(state, user, form))]
pub async fn toggle(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Form(form): Form<ToggleForm>,
) -> Response {
    run_mutation(&state, &user, Mutation::Toggle(ItemId::new(form.id))).await
}

/// Change an item's quantity (HTMX fragment).
#[instrument(skip(state, user, form))]
pub async fn quantity(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Form(form): Form<QuantityForm>,
) -> Response {
    run_mutation(
        &state,
        &user,
        Mutation::Quantity(ItemId::new(form.id), form.delta),
    )
    .await
}

/// Delete an item (HTMX fragment).
#[instrument(skip(state, user, form))]
pub async fn delete(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Form(form): Form<DeleteForm>,
) -> Response {
    run_mutation(&state, &user, Mutation::Delete(ItemId::new(form.id))).await
}
