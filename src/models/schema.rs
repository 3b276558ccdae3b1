//! Static descriptions of every administrable entity.
//!
//! A `ResourceSchema` drives the whole CRUD pipeline for its entity: the SQL
//! table layout, multipart parsing, validation, listing (search/sort/filter),
//! CSV export, reordering and flag toggling. Adding an entity means adding one
//! entry to [`RESOURCES`].

use crate::models::SortDirection;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Plain text, stripped of any HTML.
    Text,
    /// HTML produced by the rich-text widget, sanitised against an allow-list.
    RichText,
    Integer,
    Decimal,
    Boolean,
    /// `YYYY-MM-DD`
    Date,
    /// `YYYY-MM-DDTHH:MM[:SS]` or RFC 3339
    DateTime,
    Email,
    /// Uploaded file, persisted as a `/media/...` URL.
    File,
    /// Integer id of a row in the named table.
    ForeignKey(&'static str),
    /// JSON-encoded [`crate::models::ResponsableProfile`].
    Responsable,
}

impl FieldKind {
    pub fn sql_type(&self) -> &'static str {
        match self {
            FieldKind::Integer | FieldKind::Boolean | FieldKind::ForeignKey(_) => "INTEGER",
            FieldKind::Decimal => "REAL",
            _ => "TEXT",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub label: &'static str,
    pub kind: FieldKind,
    pub required: bool,
    pub unique: bool,
    pub max_len: Option<usize>,
    pub searchable: bool,
    pub sortable: bool,
    pub exportable: bool,
    /// SQL literal used as the column default.
    pub default_sql: Option<&'static str>,
}

impl FieldSpec {
    pub const fn new(name: &'static str, label: &'static str, kind: FieldKind) -> Self {
        FieldSpec {
            name,
            label,
            kind,
            required: false,
            unique: false,
            max_len: None,
            searchable: false,
            sortable: false,
            exportable: true,
            default_sql: None,
        }
    }

    pub const fn text(name: &'static str, label: &'static str) -> Self {
        FieldSpec { max_len: Some(255), ..FieldSpec::new(name, label, FieldKind::Text) }
    }

    pub const fn required(self) -> Self {
        FieldSpec { required: true, ..self }
    }

    pub const fn unique(self) -> Self {
        FieldSpec { unique: true, ..self }
    }

    pub const fn max_len(self, len: usize) -> Self {
        FieldSpec { max_len: Some(len), ..self }
    }

    pub const fn searchable(self) -> Self {
        FieldSpec { searchable: true, ..self }
    }

    pub const fn sortable(self) -> Self {
        FieldSpec { sortable: true, ..self }
    }

    pub const fn hidden_from_export(self) -> Self {
        FieldSpec { exportable: false, ..self }
    }

    pub const fn default_sql(self, literal: &'static str) -> Self {
        FieldSpec { default_sql: Some(literal), ..self }
    }

    fn column_definition(&self) -> String {
        let mut def = format!("{} {}", self.name, self.kind.sql_type());
        if self.required && self.kind != FieldKind::File {
            def.push_str(" NOT NULL");
        }
        if self.unique {
            def.push_str(" UNIQUE");
        }
        if let Some(default) = self.default_sql {
            def.push_str(" DEFAULT ");
            def.push_str(default);
        }
        if let FieldKind::ForeignKey(table) = self.kind {
            def.push_str(&format!(" REFERENCES {}(id) ON DELETE SET NULL", table));
        }
        def
    }
}

/// Single boolean flip exposed as `POST /{entity}/{id}/{action}`.
#[derive(Debug, Clone, Copy)]
pub struct ToggleSpec {
    pub action: &'static str,
    pub column: &'static str,
    /// When set, turning the flag on turns it off on every other row.
    pub exclusive: bool,
}

#[derive(Debug, Clone, Copy)]
pub enum CrossRule {
    /// `field` (a date) must not be earlier than `other`.
    NotBefore { field: &'static str, other: &'static str },
}

#[derive(Debug)]
pub struct ResourceSchema {
    pub slug: &'static str,
    pub table: &'static str,
    pub label: &'static str,
    pub fields: &'static [FieldSpec],
    pub filters: &'static [&'static str],
    pub default_sort: (&'static str, SortDirection),
    pub paginated: bool,
    pub reorderable: bool,
    pub toggle: Option<ToggleSpec>,
    pub rules: &'static [CrossRule],
}

pub const TIMESTAMP_COLUMNS: [&str; 2] = ["created_at", "updated_at"];

impl ResourceSchema {
    pub fn field(&self, name: &str) -> Option<&'static FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn has_ordre(&self) -> bool {
        self.field("ordre").is_some()
    }

    pub fn file_fields(&self) -> impl Iterator<Item = &'static FieldSpec> {
        self.fields.iter().filter(|f| f.kind == FieldKind::File)
    }

    pub fn searchable_columns(&self) -> impl Iterator<Item = &'static str> {
        self.fields.iter().filter(|f| f.searchable).map(|f| f.name)
    }

    /// `id`, the timestamps and every field flagged sortable.
    pub fn is_sortable(&self, column: &str) -> bool {
        column == "id"
            || TIMESTAMP_COLUMNS.contains(&column)
            || self.fields.iter().any(|f| f.sortable && f.name == column)
    }

    pub fn is_filterable(&self, column: &str) -> bool {
        self.filters.contains(&column)
    }

    pub fn export_columns(&self) -> Vec<&'static str> {
        let mut columns = vec!["id"];
        columns.extend(self.fields.iter().filter(|f| f.exportable).map(|f| f.name));
        columns.extend(TIMESTAMP_COLUMNS);
        columns
    }

    /// Every column of the table in declaration order.
    pub fn select_columns(&self) -> String {
        let mut columns = vec!["id"];
        columns.extend(self.fields.iter().map(|f| f.name));
        columns.extend(TIMESTAMP_COLUMNS);
        columns.join(", ")
    }

    pub fn create_table_sql(&self) -> String {
        let mut defs = vec!["id INTEGER PRIMARY KEY AUTOINCREMENT".to_string()];
        defs.extend(self.fields.iter().map(|f| f.column_definition()));
        defs.push("created_at TEXT NOT NULL".to_string());
        defs.push("updated_at TEXT NOT NULL".to_string());
        format!("CREATE TABLE IF NOT EXISTS {} (\n    {}\n)", self.table, defs.join(",\n    "))
    }
}

const ORDRE: FieldSpec = FieldSpec::new("ordre", "ordre", FieldKind::Integer).sortable().default_sql("0");
const ACTIF: FieldSpec = FieldSpec::new("actif", "actif", FieldKind::Boolean).sortable().default_sql("1");

pub static CATEGORIES: ResourceSchema = ResourceSchema {
    slug: "categories",
    table: "categories",
    label: "Catégories",
    fields: &[
        FieldSpec::text("nom", "nom").required().unique().searchable().sortable(),
        FieldSpec::text("type", "type").sortable(),
        FieldSpec::new("description", "description", FieldKind::Text).max_len(1000),
    ],
    filters: &["type"],
    default_sort: ("nom", SortDirection::Asc),
    paginated: true,
    reorderable: false,
    toggle: None,
    rules: &[],
};

pub static ACTUALITES: ResourceSchema = ResourceSchema {
    slug: "actualites",
    table: "actualites",
    label: "Actualités",
    fields: &[
        FieldSpec::text("titre", "titre").required().searchable().sortable(),
        FieldSpec::new("resume", "résumé", FieldKind::Text).max_len(500).searchable(),
        FieldSpec::new("contenu", "contenu", FieldKind::RichText).hidden_from_export(),
        FieldSpec::new("image", "image", FieldKind::File),
        FieldSpec::new("category_id", "catégorie", FieldKind::ForeignKey("categories")).sortable(),
        FieldSpec::text("categorie", "catégorie libre").searchable().sortable(),
        FieldSpec::new("date_publication", "date de publication", FieldKind::Date).sortable(),
        ACTIF,
    ],
    filters: &["category_id", "categorie", "actif"],
    default_sort: ("date_publication", SortDirection::Desc),
    paginated: true,
    reorderable: false,
    toggle: None,
    rules: &[],
};

pub static EVENEMENTS: ResourceSchema = ResourceSchema {
    slug: "evenements",
    table: "evenements",
    label: "Événements",
    fields: &[
        FieldSpec::text("titre", "titre").required().searchable().sortable(),
        FieldSpec::new("description", "description", FieldKind::Text).max_len(1000).searchable(),
        FieldSpec::new("contenu", "contenu", FieldKind::RichText).hidden_from_export(),
        FieldSpec::new("date_debut", "date de début", FieldKind::Date).required().sortable(),
        FieldSpec::new("date_fin", "date de fin", FieldKind::Date).sortable(),
        FieldSpec::text("lieu", "lieu").searchable().sortable(),
        FieldSpec::new("image", "image", FieldKind::File),
        FieldSpec::new("category_id", "catégorie", FieldKind::ForeignKey("categories")).sortable(),
        FieldSpec::text("categorie", "catégorie libre").searchable(),
        ACTIF,
    ],
    filters: &["category_id", "categorie", "actif"],
    default_sort: ("date_debut", SortDirection::Desc),
    paginated: true,
    reorderable: false,
    toggle: None,
    rules: &[CrossRule::NotBefore { field: "date_fin", other: "date_debut" }],
};

pub static SLIDES: ResourceSchema = ResourceSchema {
    slug: "slides",
    table: "slides",
    label: "Diaporama",
    fields: &[
        FieldSpec::text("titre", "titre").required().searchable().sortable(),
        FieldSpec::text("sous_titre", "sous-titre").searchable(),
        FieldSpec::new("image", "image", FieldKind::File).required(),
        FieldSpec::text("lien", "lien"),
        ORDRE,
        ACTIF,
    ],
    filters: &["actif"],
    default_sort: ("ordre", SortDirection::Asc),
    paginated: true,
    reorderable: false,
    toggle: None,
    rules: &[],
};

pub static DIRECTIONS: ResourceSchema = ResourceSchema {
    slug: "directions",
    table: "directions",
    label: "Directions",
    fields: &[
        FieldSpec::text("nom", "nom").required().searchable().sortable(),
        FieldSpec::text("sigle", "sigle").max_len(50).searchable().sortable(),
        FieldSpec::new("description", "description", FieldKind::Text).max_len(1000).searchable(),
        FieldSpec::new("contenu", "contenu", FieldKind::RichText).hidden_from_export(),
        FieldSpec::new("responsable", "responsable", FieldKind::Responsable).hidden_from_export(),
        FieldSpec::new("responsable_photo", "photo du responsable", FieldKind::File).hidden_from_export(),
        ORDRE,
        ACTIF,
    ],
    filters: &["actif"],
    default_sort: ("ordre", SortDirection::Asc),
    paginated: true,
    reorderable: false,
    toggle: None,
    rules: &[],
};

pub static ADJOINTS: ResourceSchema = ResourceSchema {
    slug: "adjoints",
    table: "adjoints",
    label: "Adjoints",
    fields: &[
        FieldSpec::text("nom", "nom").required().searchable().sortable(),
        FieldSpec::text("prenom", "prénom").searchable().sortable(),
        FieldSpec::text("fonction", "fonction").required().searchable(),
        FieldSpec::new("delegation", "délégation", FieldKind::Text).max_len(1000).searchable(),
        FieldSpec::new("photo", "photo", FieldKind::File),
        FieldSpec::new("email", "email", FieldKind::Email),
        FieldSpec::text("telephone", "téléphone").max_len(30),
        ORDRE,
        ACTIF,
    ],
    filters: &["actif"],
    default_sort: ("ordre", SortDirection::Asc),
    paginated: false,
    reorderable: true,
    toggle: None,
    rules: &[],
};

pub static LIEUX: ResourceSchema = ResourceSchema {
    slug: "lieux",
    table: "lieux",
    label: "Lieux",
    fields: &[
        FieldSpec::text("nom", "nom").required().searchable().sortable(),
        FieldSpec::text("categorie", "catégorie").searchable().sortable(),
        FieldSpec::text("adresse", "adresse").searchable(),
        FieldSpec::new("description", "description", FieldKind::Text).max_len(2000),
        FieldSpec::new("latitude", "latitude", FieldKind::Decimal),
        FieldSpec::new("longitude", "longitude", FieldKind::Decimal),
        FieldSpec::new("image", "image", FieldKind::File),
        ORDRE,
        ACTIF,
    ],
    filters: &["categorie", "actif"],
    default_sort: ("ordre", SortDirection::Asc),
    paginated: false,
    reorderable: true,
    toggle: None,
    rules: &[],
};

pub static CONTACTS: ResourceSchema = ResourceSchema {
    slug: "contacts",
    table: "contacts",
    label: "Messages de contact",
    fields: &[
        FieldSpec::text("nom", "nom").required().searchable().sortable(),
        FieldSpec::new("email", "email", FieldKind::Email).required().searchable().sortable(),
        FieldSpec::text("telephone", "téléphone").max_len(30),
        FieldSpec::text("sujet", "sujet").required().searchable().sortable(),
        FieldSpec::new("message", "message", FieldKind::Text).required().max_len(5000),
        FieldSpec::new("status", "traité", FieldKind::Boolean).sortable().default_sql("0"),
    ],
    filters: &["status"],
    default_sort: ("created_at", SortDirection::Desc),
    paginated: true,
    reorderable: false,
    toggle: Some(ToggleSpec { action: "toggle-status", column: "status", exclusive: false }),
    rules: &[],
};

pub static CONTENT_BLOCKS: ResourceSchema = ResourceSchema {
    slug: "content-blocks",
    table: "content_blocks",
    label: "Blocs de contenu",
    fields: &[
        FieldSpec::text("page", "page").required().max_len(100).searchable().sortable(),
        FieldSpec::text("cle", "clé").required().max_len(100).searchable().sortable(),
        FieldSpec::text("titre", "titre").searchable(),
        FieldSpec::new("contenu", "contenu", FieldKind::RichText).hidden_from_export(),
        FieldSpec::new("image", "image", FieldKind::File),
        ORDRE,
        ACTIF,
    ],
    filters: &["page", "actif"],
    default_sort: ("page", SortDirection::Asc),
    paginated: true,
    reorderable: false,
    toggle: None,
    rules: &[],
};

pub static JOURNAL: ResourceSchema = ResourceSchema {
    slug: "journal",
    table: "journal_editions",
    label: "Journal municipal",
    fields: &[
        FieldSpec::text("titre", "titre").required().searchable().sortable(),
        FieldSpec::new("numero", "numéro", FieldKind::Integer).sortable(),
        FieldSpec::new("date_parution", "date de parution", FieldKind::Date).required().sortable(),
        FieldSpec::new("description", "description", FieldKind::Text).max_len(1000).searchable(),
        FieldSpec::new("couverture", "couverture", FieldKind::File),
        FieldSpec::new("fichier", "fichier", FieldKind::File).required(),
        ACTIF,
    ],
    filters: &["actif"],
    default_sort: ("date_parution", SortDirection::Desc),
    paginated: true,
    reorderable: false,
    toggle: None,
    rules: &[],
};

pub static MESSAGES_MAIRE: ResourceSchema = ResourceSchema {
    slug: "messages-maire",
    table: "messages_maire",
    label: "Messages du maire",
    fields: &[
        FieldSpec::text("titre", "titre").required().searchable().sortable(),
        FieldSpec::new("contenu", "contenu", FieldKind::RichText).required().hidden_from_export(),
        FieldSpec::new("photo", "photo", FieldKind::File),
        FieldSpec::text("signature", "signature"),
        FieldSpec::new("actif", "actif", FieldKind::Boolean).sortable().default_sql("0"),
    ],
    filters: &["actif"],
    default_sort: ("created_at", SortDirection::Desc),
    paginated: false,
    reorderable: false,
    toggle: Some(ToggleSpec { action: "toggle-actif", column: "actif", exclusive: true }),
    rules: &[],
};

pub static PATRIMOINES: ResourceSchema = ResourceSchema {
    slug: "patrimoines",
    table: "patrimoines",
    label: "Patrimoine",
    fields: &[
        FieldSpec::text("titre", "titre").required().searchable().sortable(),
        FieldSpec::text("periode", "période").max_len(100).searchable().sortable(),
        FieldSpec::new("description", "description", FieldKind::Text).max_len(1000).searchable(),
        FieldSpec::new("contenu", "contenu", FieldKind::RichText).hidden_from_export(),
        FieldSpec::new("image", "image", FieldKind::File),
        ORDRE,
        ACTIF,
    ],
    filters: &["actif"],
    default_sort: ("ordre", SortDirection::Asc),
    paginated: true,
    reorderable: false,
    toggle: None,
    rules: &[],
};

pub static SETTINGS: ResourceSchema = ResourceSchema {
    slug: "settings",
    table: "settings",
    label: "Paramètres",
    fields: &[
        FieldSpec::text("cle", "clé").required().unique().max_len(100).searchable().sortable(),
        FieldSpec::new("valeur", "valeur", FieldKind::Text).max_len(2000).searchable(),
        FieldSpec::text("groupe", "groupe").max_len(100).sortable(),
        FieldSpec::text("label", "libellé"),
    ],
    filters: &["groupe"],
    default_sort: ("cle", SortDirection::Asc),
    paginated: false,
    reorderable: false,
    toggle: None,
    rules: &[],
};

/// Every administrable entity, in table creation order (referenced tables first).
pub static RESOURCES: [&ResourceSchema; 13] = [
    &CATEGORIES,
    &ACTUALITES,
    &EVENEMENTS,
    &SLIDES,
    &DIRECTIONS,
    &ADJOINTS,
    &LIEUX,
    &CONTACTS,
    &CONTENT_BLOCKS,
    &JOURNAL,
    &MESSAGES_MAIRE,
    &PATRIMOINES,
    &SETTINGS,
];

pub fn find_resource(slug: &str) -> Option<&'static ResourceSchema> {
    RESOURCES.iter().copied().find(|schema| schema.slug == slug)
}
