pub mod admin_helpers;
pub mod export_helpers;
pub mod form_helpers;
pub mod listing_helpers;
pub mod media_helpers;
pub mod public_helpers;
pub mod reorder_helpers;
pub mod sanitization_helpers;
pub mod site_helpers;
pub mod validation_helpers;
