use clap::ValueEnum;
use std::cmp::Ordering;
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

use crate::models::JobRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SortField {
    Title,
    Company,
    Location,
}

impl SortField {
    pub fn label(self) -> &'static str {
        match self {
            SortField::Title => "Title",
            SortField::Company => "Company",
            SortField::Location => "Location",
        }
    }

    /// Missing values sort as the empty string.
    fn key(self, job: &JobRecord) -> &str {
        let value = match self {
            SortField::Title => &job.title,
            SortField::Company => &job.company,
            SortField::Location => &job.location,
        };
        value.as_deref().unwrap_or("")
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn flip(self) -> Self {
        match self {
            SortDirection::Ascending => SortDirection::Descending,
            SortDirection::Descending => SortDirection::Ascending,
        }
    }

    pub fn arrow(self) -> &'static str {
        match self {
            SortDirection::Ascending => "^",
            SortDirection::Descending => "v",
        }
    }
}

/// Filter and sort settings of one table view.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewState {
    pub filter_text: String,
    pub sort_field: Option<SortField>,
    pub sort_direction: SortDirection,
}

impl ViewState {
    /// Same field flips the direction; a new field starts ascending.
    pub fn toggle_sort(&mut self, field: SortField) {
        if self.sort_field == Some(field) {
            self.sort_direction = self.sort_direction.flip();
        } else {
            self.sort_field = Some(field);
            self.sort_direction = SortDirection::Ascending;
        }
    }

    pub fn clear_sort(&mut self) {
        self.sort_field = None;
        self.sort_direction = SortDirection::Ascending;
    }

    /// Filters, then sorts, without touching `jobs`.
    pub fn apply<'a>(&self, jobs: &'a [JobRecord]) -> Vec<&'a JobRecord> {
        let mut view = filter_jobs(jobs.iter(), &self.filter_text);
        if let Some(field) = self.sort_field {
            sort_jobs(&mut view, field, self.sort_direction);
        }
        view
    }
}

pub fn filter_jobs<'a>(
    jobs: impl IntoIterator<Item = &'a JobRecord>,
    filter_text: &str,
) -> Vec<&'a JobRecord> {
    if filter_text.is_empty() {
        return jobs.into_iter().collect();
    }
    let needle = filter_text.to_lowercase();
    jobs.into_iter()
        .filter(|job| {
            [&job.title, &job.company, &job.location]
                .into_iter()
                .flatten()
                .any(|value| value.to_lowercase().contains(&needle))
        })
        .collect()
}

pub fn sort_jobs(view: &mut [&JobRecord], field: SortField, direction: SortDirection) {
    // Both arms are stable sorts, so equal keys keep arrival order either way.
    match direction {
        SortDirection::Ascending => view.sort_by(|a, b| locale_cmp(field.key(a), field.key(b))),
        SortDirection::Descending => view.sort_by(|a, b| locale_cmp(field.key(b), field.key(a))),
    }
}

/// Dictionary-style comparison. Base letters decide first, ignoring case
/// and accents; then unaccented sorts before accented, then lowercase
/// before uppercase.
pub fn locale_cmp(a: &str, b: &str) -> Ordering {
    base_letters(a)
        .cmp(base_letters(b))
        .then_with(|| folded(a).cmp(folded(b)))
        .then_with(|| {
            a.chars()
                .map(char::is_uppercase)
                .cmp(b.chars().map(char::is_uppercase))
        })
}

fn folded(s: &str) -> impl Iterator<Item = char> + '_ {
    s.nfd().flat_map(char::to_lowercase)
}

fn base_letters(s: &str) -> impl Iterator<Item = char> + '_ {
    folded(s).filter(|c| !is_combining_mark(*c))
}
