// ABOUTME: Contact CRUD and chat line route handlers
// ABOUTME: REST endpoints for managing contacts and appending transcribed chat history
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Rapport Project

//! Contact and chat line routes

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post, put},
    Json, Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::database::{ChatLineRecord, ContactSummary, ContactUpdate, NewChatLine};
use crate::errors::{AppError, AppResult};
use crate::server::ServerResources;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request to create a contact
#[derive(Debug, Deserialize)]
pub struct CreateContactRequest {
    /// Display name (required)
    pub name: String,
    /// Avatar URL (a placeholder is substituted when empty)
    #[serde(default)]
    pub avatar: Option<String>,
    /// Free-text notes
    #[serde(default)]
    pub notes: String,
    /// Comma-separated tags
    #[serde(default)]
    pub tags: String,
}

/// Response wrapping one contact
#[derive(Debug, Serialize, Deserialize)]
pub struct ContactResponse {
    /// The contact with derived statistics
    pub contact: ContactSummary,
}

/// Response wrapping the contact listing
#[derive(Debug, Serialize, Deserialize)]
pub struct ContactListResponse {
    /// All contacts, most recently updated first
    pub contacts: Vec<ContactSummary>,
}

/// Response wrapping a contact's chat lines
#[derive(Debug, Serialize, Deserialize)]
pub struct ChatLineListResponse {
    /// Lines in chronological order
    pub chat_lines: Vec<ChatLineRecord>,
}

/// Request to bulk-append chat lines
#[derive(Debug, Deserialize)]
pub struct AddChatLinesRequest {
    /// The lines to append, in conversation order
    pub lines: Vec<NewChatLine>,
    /// Calendar date the lines belong to (`YYYY-MM-DD`, defaults to today)
    #[serde(default)]
    pub date: Option<String>,
}

/// Response for a bulk append
#[derive(Debug, Serialize, Deserialize)]
pub struct AddChatLinesResponse {
    /// Confirmation message
    pub message: String,
    /// Number of lines written
    pub count: usize,
}

/// Generic confirmation message
#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    /// Confirmation message
    pub message: String,
}

// ============================================================================
// Contact Routes
// ============================================================================

/// Contact routes handler
pub struct ContactRoutes;

impl ContactRoutes {
    /// Create all contact routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route("/api/contacts", post(Self::create_contact))
            .route("/api/contacts", get(Self::list_contacts))
            .route("/api/contacts/:contact_id", get(Self::get_contact))
            .route("/api/contacts/:contact_id", put(Self::update_contact))
            .route("/api/contacts/:contact_id", delete(Self::delete_contact))
            .route(
                "/api/contacts/:contact_id/chat-lines",
                get(Self::list_chat_lines),
            )
            .route(
                "/api/contacts/:contact_id/chat-lines",
                post(Self::add_chat_lines),
            )
            .with_state(resources)
    }

    /// Create a contact
    async fn create_contact(
        State(resources): State<Arc<ServerResources>>,
        Json(request): Json<CreateContactRequest>,
    ) -> AppResult<impl IntoResponse> {
        if request.name.trim().is_empty() {
            return Err(AppError::invalid_input("Contact name must not be empty"));
        }

        let record = resources
            .database
            .contacts()
            .create(
                request.name.trim(),
                request.avatar.as_deref(),
                &request.notes,
                &request.tags,
            )
            .await?;

        let contact = resources
            .database
            .contacts()
            .summary(record.id)
            .await?
            .ok_or_else(|| AppError::internal("Contact missing after create"))?;

        Ok((StatusCode::CREATED, Json(ContactResponse { contact })))
    }

    /// List all contacts
    async fn list_contacts(
        State(resources): State<Arc<ServerResources>>,
    ) -> AppResult<Json<ContactListResponse>> {
        let contacts = resources.database.contacts().list().await?;
        Ok(Json(ContactListResponse { contacts }))
    }

    /// Get one contact
    async fn get_contact(
        State(resources): State<Arc<ServerResources>>,
        Path(contact_id): Path<i64>,
    ) -> AppResult<Json<ContactResponse>> {
        let contact = resources
            .database
            .contacts()
            .summary(contact_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Contact {contact_id}")))?;

        Ok(Json(ContactResponse { contact }))
    }

    /// Apply a partial update to a contact
    async fn update_contact(
        State(resources): State<Arc<ServerResources>>,
        Path(contact_id): Path<i64>,
        Json(update): Json<ContactUpdate>,
    ) -> AppResult<Json<ContactResponse>> {
        resources
            .database
            .contacts()
            .update(contact_id, &update)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Contact {contact_id}")))?;

        let contact = resources
            .database
            .contacts()
            .summary(contact_id)
            .await?
            .ok_or_else(|| AppError::internal("Contact missing after update"))?;

        Ok(Json(ContactResponse { contact }))
    }

    /// Delete a contact; chat lines and analysis cascade
    async fn delete_contact(
        State(resources): State<Arc<ServerResources>>,
        Path(contact_id): Path<i64>,
    ) -> AppResult<Json<MessageResponse>> {
        let deleted = resources.database.contacts().delete(contact_id).await?;
        if !deleted {
            return Err(AppError::not_found(format!("Contact {contact_id}")));
        }

        Ok(Json(MessageResponse {
            message: "Contact deleted".to_owned(),
        }))
    }

    /// List a contact's chat lines in chronological order
    async fn list_chat_lines(
        State(resources): State<Arc<ServerResources>>,
        Path(contact_id): Path<i64>,
    ) -> AppResult<Json<ChatLineListResponse>> {
        resources
            .database
            .contacts()
            .get(contact_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Contact {contact_id}")))?;

        let chat_lines = resources
            .database
            .chat_lines()
            .list_for_contact(contact_id)
            .await?;

        Ok(Json(ChatLineListResponse { chat_lines }))
    }

    /// Bulk-append chat lines for one date
    async fn add_chat_lines(
        State(resources): State<Arc<ServerResources>>,
        Path(contact_id): Path<i64>,
        Json(request): Json<AddChatLinesRequest>,
    ) -> AppResult<Json<AddChatLinesResponse>> {
        resources
            .database
            .contacts()
            .get(contact_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Contact {contact_id}")))?;

        let chat_date = match &request.date {
            Some(date) => {
                NaiveDate::parse_from_str(date, "%Y-%m-%d")
                    .map_err(|_| AppError::invalid_input(format!("Invalid date: {date}")))?;
                date.clone()
            }
            None => chrono::Local::now().format("%Y-%m-%d").to_string(),
        };

        let count = resources
            .database
            .chat_lines()
            .append_lines(contact_id, &chat_date, &request.lines)
            .await?;

        Ok(Json(AddChatLinesResponse {
            message: "Chat lines saved".to_owned(),
            count,
        }))
    }
}
