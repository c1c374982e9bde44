//! Column mapping for each resource kind.

use chrono::{DateTime, Utc};
use content::{Activity, Event, Photo, Resource};

/// Table layout of a resource kind.
///
/// `COLUMNS` are the kind-specific columns in the order produced by
/// [`SqlRecord::values`] and consumed by [`SqlRecord::from_cells`]. The
/// shared `id`, `created_at` and `updated_at` columns are not listed.
pub trait SqlRecord: Resource {
    const TABLE: &'static str;
    const COLUMNS: &'static [&'static str];

    fn values(&self) -> Vec<Option<String>>;

    fn from_cells(
        id: String,
        cells: &mut Cells,
        created_at: Option<DateTime<Utc>>,
        updated_at: Option<DateTime<Utc>>,
    ) -> Result<Self, String>;
}

/// Column values of one row, consumed in `COLUMNS` order.
pub struct Cells {
    names: std::slice::Iter<'static, &'static str>,
    values: std::vec::IntoIter<Option<String>>,
}

impl Cells {
    pub(super) fn new(names: &'static [&'static str], values: Vec<Option<String>>) -> Self {
        Self {
            names: names.iter(),
            values: values.into_iter(),
        }
    }

    fn next(&mut self) -> (&'static str, Option<String>) {
        let name = self.names.next().copied().unwrap_or("?");
        (name, self.values.next().flatten())
    }

    pub fn required(&mut self) -> Result<String, String> {
        match self.next() {
            (_, Some(value)) => Ok(value),
            (name, None) => Err(format!("column {name} is NULL")),
        }
    }

    pub fn optional(&mut self) -> Option<String> {
        self.next().1
    }
}

impl SqlRecord for Activity {
    const TABLE: &'static str = "activities";
    const COLUMNS: &'static [&'static str] = &["title", "description", "image", "display_on"];

    fn values(&self) -> Vec<Option<String>> {
        vec![
            Some(self.title.clone()),
            Some(self.description.clone()),
            self.image.clone(),
            Some(self.display_on.clone()),
        ]
    }

    fn from_cells(
        id: String,
        cells: &mut Cells,
        created_at: Option<DateTime<Utc>>,
        updated_at: Option<DateTime<Utc>>,
    ) -> Result<Self, String> {
        Ok(Self {
            id,
            title: cells.required()?,
            description: cells.required()?,
            image: cells.optional(),
            display_on: cells.required()?,
            created_at,
            updated_at,
        })
    }
}

impl SqlRecord for Event {
    const TABLE: &'static str = "events";
    const COLUMNS: &'static [&'static str] = &[
        "title",
        "date",
        "time",
        "venue",
        "description",
        "image",
        "display_on",
    ];

    fn values(&self) -> Vec<Option<String>> {
        vec![
            Some(self.title.clone()),
            Some(self.date.clone()),
            Some(self.time.clone()),
            Some(self.venue.clone()),
            Some(self.description.clone()),
            self.image.clone(),
            Some(self.display_on.clone()),
        ]
    }

    fn from_cells(
        id: String,
        cells: &mut Cells,
        created_at: Option<DateTime<Utc>>,
        updated_at: Option<DateTime<Utc>>,
    ) -> Result<Self, String> {
        Ok(Self {
            id,
            title: cells.required()?,
            date: cells.required()?,
            time: cells.required()?,
            venue: cells.required()?,
            description: cells.required()?,
            image: cells.optional(),
            display_on: cells.required()?,
            created_at,
            updated_at,
        })
    }
}

impl SqlRecord for Photo {
    const TABLE: &'static str = "photos";
    const COLUMNS: &'static [&'static str] = &["image", "category"];

    fn values(&self) -> Vec<Option<String>> {
        vec![Some(self.image.clone()), Some(self.category.clone())]
    }

    fn from_cells(
        id: String,
        cells: &mut Cells,
        created_at: Option<DateTime<Utc>>,
        updated_at: Option<DateTime<Utc>>,
    ) -> Result<Self, String> {
        Ok(Self {
            id,
            image: cells.required()?,
            category: cells.required()?,
            created_at,
            updated_at,
        })
    }
}
