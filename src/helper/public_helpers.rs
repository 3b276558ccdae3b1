use crate::config::ListingConfig;
use crate::helper::listing_helpers::{ListingQuery, ResolvedListing};
use crate::models::db_operations::resource_db_operations::{self as resource_db, DbError};
use crate::models::schema::{
    ResourceSchema, ACTUALITES, ADJOINTS, CATEGORIES, CONTENT_BLOCKS, DIRECTIONS, EVENEMENTS, MESSAGES_MAIRE, SLIDES,
};
use crate::models::{Page, Record, SortDirection};
use chrono::NaiveDate;
use rusqlite::types::Value as SqlValue;
use rusqlite::Connection;

const HOME_ACTUALITES: usize = 3;
const HOME_EVENEMENTS: usize = 3;

/// Everything the public site shows of an entity is its `actif` rows.
fn published(schema: &'static ResourceSchema, sort: Option<(&'static str, SortDirection)>) -> ResolvedListing {
    let (sort, direction) = sort.unwrap_or(schema.default_sort);
    ResolvedListing {
        search: None,
        filters: vec![("actif", SqlValue::Integer(1))],
        sort,
        direction,
        per_page: u32::MAX,
        page: 1,
    }
}

pub fn fetch_published(conn: &Connection, schema: &'static ResourceSchema) -> Result<Vec<Record>, DbError> {
    resource_db::list_all(conn, schema, &published(schema, None))
}

pub struct HomePage {
    pub slides: Vec<Record>,
    pub message_maire: Option<Record>,
    pub actualites: Vec<Record>,
    pub evenements: Vec<Record>,
}

pub fn fetch_home_page(conn: &Connection, today: NaiveDate) -> Result<HomePage, DbError> {
    let slides = resource_db::list_all(conn, &SLIDES, &published(&SLIDES, Some(("ordre", SortDirection::Asc))))?;
    let message_maire = fetch_published(conn, &MESSAGES_MAIRE)?.into_iter().next();
    let mut actualites = fetch_published(conn, &ACTUALITES)?;
    actualites.truncate(HOME_ACTUALITES);
    let mut evenements = fetch_upcoming_evenements(conn, today)?;
    evenements.truncate(HOME_EVENEMENTS);
    Ok(HomePage { slides, message_maire, actualites, evenements })
}

/// Events not yet over: ending (or, without an end date, starting) today or later.
pub fn fetch_upcoming_evenements(conn: &Connection, today: NaiveDate) -> Result<Vec<Record>, DbError> {
    let listing = published(&EVENEMENTS, Some(("date_debut", SortDirection::Asc)));
    Ok(resource_db::list_all(conn, &EVENEMENTS, &listing)?
        .into_iter()
        .filter(|event| {
            event
                .date_field("date_fin")
                .or_else(|| event.date_field("date_debut"))
                .is_some_and(|last_day| last_day >= today)
        })
        .collect())
}

pub fn fetch_past_evenements(conn: &Connection, today: NaiveDate) -> Result<Vec<Record>, DbError> {
    let listing = published(&EVENEMENTS, Some(("date_debut", SortDirection::Desc)));
    Ok(resource_db::list_all(conn, &EVENEMENTS, &listing)?
        .into_iter()
        .filter(|event| {
            event
                .date_field("date_fin")
                .or_else(|| event.date_field("date_debut"))
                .is_some_and(|last_day| last_day < today)
        })
        .collect())
}

/// Public news listing: the visitor's search, category filter and page, on
/// published rows only.
pub fn fetch_actualites_page(conn: &Connection, query: &ListingQuery, limits: &ListingConfig) -> Result<Page<Record>, DbError> {
    let mut listing = query.resolve(&ACTUALITES, limits);
    listing.filters.retain(|(column, _)| *column != "actif");
    listing.filters.push(("actif", SqlValue::Integer(1)));
    resource_db::list_page(conn, &ACTUALITES, &listing)
}

/// A single published article. Unpublished ones are treated as missing.
pub fn fetch_actualite(conn: &Connection, id: i64) -> Result<Option<Record>, DbError> {
    Ok(resource_db::find(conn, &ACTUALITES, id)?.filter(|record| record.bool_field("actif")))
}

pub fn fetch_categories(conn: &Connection) -> Result<Vec<Record>, DbError> {
    resource_db::list_all(conn, &CATEGORIES, &ResolvedListing {
        search: None,
        filters: Vec::new(),
        sort: "nom",
        direction: SortDirection::Asc,
        per_page: u32::MAX,
        page: 1,
    })
}

pub fn fetch_content_blocks(conn: &Connection, page: &str) -> Result<Vec<Record>, DbError> {
    let mut listing = published(&CONTENT_BLOCKS, Some(("ordre", SortDirection::Asc)));
    listing.filters.push(("page", SqlValue::Text(page.to_string())));
    resource_db::list_all(conn, &CONTENT_BLOCKS, &listing)
}

pub fn fetch_directions(conn: &Connection) -> Result<Vec<Record>, DbError> {
    fetch_published(conn, &DIRECTIONS)
}

pub fn fetch_conseil(conn: &Connection) -> Result<Vec<Record>, DbError> {
    fetch_published(conn, &ADJOINTS)
}
