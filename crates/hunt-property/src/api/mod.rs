//! HTTP handlers, one router per entity group.

mod auth;
mod calculators;
pub mod extract;
mod favorites;
mod filter_screen;
mod forms;
mod home;
mod inquiries;
mod notifications;
mod orders;
mod plans;
mod properties;
mod reviews;
mod transactions;
mod uploads;
mod users;

use std::sync::Arc;

use axum::Router;
use mongodb::Database;

use crate::config::ContentConfig;
use crate::domain::facets::PropertyIndex;
use crate::domain::favorite::Favorite;
use crate::domain::forms::{HomeLoanApplication, PropertyCostCalculation, Requirement};
use crate::domain::inquiry::Inquiry;
use crate::domain::notification::Notification;
use crate::domain::order::Order;
use crate::domain::property::Property;
use crate::domain::review::Review;
use crate::domain::transaction::Transaction;
use crate::domain::user::User;
use crate::otp::OtpService;
use crate::store::{MemoryStore, MongoStore, Repository};

/// One repository per collection, behind trait objects so handlers do not care
/// which backend is active.
#[derive(Clone)]
pub struct Stores {
    pub properties: Arc<dyn Repository<Property>>,
    pub property_index: Arc<dyn PropertyIndex>,
    pub users: Arc<dyn Repository<User>>,
    pub favorites: Arc<dyn Repository<Favorite>>,
    pub reviews: Arc<dyn Repository<Review>>,
    pub inquiries: Arc<dyn Repository<Inquiry>>,
    pub transactions: Arc<dyn Repository<Transaction>>,
    pub notifications: Arc<dyn Repository<Notification>>,
    pub orders: Arc<dyn Repository<Order>>,
    pub requirements: Arc<dyn Repository<Requirement>>,
    pub home_loans: Arc<dyn Repository<HomeLoanApplication>>,
    pub cost_calculations: Arc<dyn Repository<PropertyCostCalculation>>,
}

impl Stores {
    pub fn in_memory() -> Self {
        let properties = MemoryStore::<Property>::default();
        Self {
            properties: Arc::new(properties.clone()),
            property_index: Arc::new(properties),
            users: Arc::new(MemoryStore::<User>::default()),
            favorites: Arc::new(MemoryStore::<Favorite>::default()),
            reviews: Arc::new(MemoryStore::<Review>::default()),
            inquiries: Arc::new(MemoryStore::<Inquiry>::default()),
            transactions: Arc::new(MemoryStore::<Transaction>::default()),
            notifications: Arc::new(MemoryStore::<Notification>::default()),
            orders: Arc::new(MemoryStore::<Order>::default()),
            requirements: Arc::new(MemoryStore::<Requirement>::default()),
            home_loans: Arc::new(MemoryStore::<HomeLoanApplication>::default()),
            cost_calculations: Arc::new(MemoryStore::<PropertyCostCalculation>::default()),
        }
    }

    pub fn mongo(database: &Database) -> Self {
        let properties = MongoStore::<Property>::new(database);
        Self {
            properties: Arc::new(properties.clone()),
            property_index: Arc::new(properties),
            users: Arc::new(MongoStore::<User>::new(database)),
            favorites: Arc::new(MongoStore::<Favorite>::new(database)),
            reviews: Arc::new(MongoStore::<Review>::new(database)),
            inquiries: Arc::new(MongoStore::<Inquiry>::new(database)),
            transactions: Arc::new(MongoStore::<Transaction>::new(database)),
            notifications: Arc::new(MongoStore::<Notification>::new(database)),
            orders: Arc::new(MongoStore::<Order>::new(database)),
            requirements: Arc::new(MongoStore::<Requirement>::new(database)),
            home_loans: Arc::new(MongoStore::<HomeLoanApplication>::new(database)),
            cost_calculations: Arc::new(MongoStore::<PropertyCostCalculation>::new(database)),
        }
    }
}

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppContext {
    pub stores: Stores,
    pub otp: Arc<OtpService>,
    pub content: Arc<ContentConfig>,
    /// Echo issued OTP codes in the response body.
    pub expose_otp: bool,
}

impl AppContext {
    pub fn new(stores: Stores, otp: OtpService, content: ContentConfig, expose_otp: bool) -> Self {
        Self {
            stores,
            otp: Arc::new(otp),
            content: Arc::new(content),
            expose_otp,
        }
    }

    /// Fully in-process context with default content settings.
    pub fn in_memory() -> Self {
        Self::new(
            Stores::in_memory(),
            OtpService::in_memory(10),
            ContentConfig::default(),
            true,
        )
    }

    pub fn with_content(mut self, content: ContentConfig) -> Self {
        self.content = Arc::new(content);
        self
    }
}

/// Every `/api/*` route.
pub fn api_router(context: AppContext) -> Router {
    Router::new()
        .merge(properties::router())
        .merge(filter_screen::router())
        .merge(home::router())
        .merge(users::router())
        .merge(auth::router())
        .merge(favorites::router())
        .merge(reviews::router())
        .merge(inquiries::router())
        .merge(transactions::router())
        .merge(notifications::router())
        .merge(orders::router())
        .merge(plans::router())
        .merge(calculators::router())
        .merge(forms::router())
        .merge(uploads::router())
        .with_state(context)
}
