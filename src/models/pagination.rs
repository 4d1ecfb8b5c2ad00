use serde::Serialize;

/// Which slice of a listing a request asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub number: u32,
    pub num_pages: u32,
    pub per_page: u32,
}

impl PageWindow {
    /// Resolves the raw `?page=` value against the total row count.
    ///
    /// Returns `None` for anything that is not a page of the listing:
    /// non-numeric values, zero, or numbers past the last page. An empty
    /// listing still has one (empty) first page.
    pub fn resolve(raw: Option<&str>, total: i64, per_page: u32) -> Option<Self> {
        let per_page = per_page.max(1);
        let total = total.max(0) as u64;
        let num_pages = ((total + per_page as u64 - 1) / per_page as u64).max(1) as u32;

        let number = match raw.map(str::trim) {
            None | Some("") => 1,
            Some("last") => num_pages,
            Some(value) => value.parse::<u32>().ok()?,
        };

        if number == 0 || number > num_pages {
            return None;
        }
        Some(PageWindow { number, num_pages, per_page })
    }

    pub fn offset(&self) -> u32 {
        (self.number - 1) * self.per_page
    }

    pub fn limit(&self) -> u32 {
        self.per_page
    }
}

#[derive(Debug, Serialize)]
pub struct Page<T: Serialize> {
    pub items: Vec<T>,
    pub number: u32,
    pub num_pages: u32,
    pub has_previous: bool,
    pub has_next: bool,
    pub previous_page_number: u32,
    pub next_page_number: u32,
}

impl<T: Serialize> Page<T> {
    pub fn new(items: Vec<T>, window: PageWindow) -> Self {
        let has_previous = window.number > 1;
        let has_next = window.number < window.num_pages;
        Page {
            items,
            number: window.number,
            num_pages: window.num_pages,
            has_previous,
            has_next,
            previous_page_number: if has_previous { window.number - 1 } else { 0 },
            next_page_number: if has_next { window.number + 1 } else { 0 },
        }
    }
}
