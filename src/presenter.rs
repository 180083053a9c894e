use std::sync::Mutex;

use crate::news::NewsItem;

/// Display states the aggregator can request.
pub trait NewsPresenter: Send + Sync {
    fn show_loading(&self);

    fn show_items(&self, items: &[NewsItem]);

    /// Nothing to show; the news section should be hidden.
    fn show_empty(&self);
}

#[derive(Debug, Clone, PartialEq)]
pub enum WidgetView {
    Loading,
    Items(Vec<NewsItem>),
    Hidden,
}

/// Records the latest requested view for the web layer to render.
#[derive(Debug)]
pub struct WidgetPresenter {
    view: Mutex<WidgetView>,
}

impl Default for WidgetPresenter {
    fn default() -> Self {
        Self {
            view: Mutex::new(WidgetView::Loading),
        }
    }
}

impl WidgetPresenter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn view(&self) -> WidgetView {
        self.view.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn set(&self, view: WidgetView) {
        *self.view.lock().unwrap_or_else(|e| e.into_inner()) = view;
    }
}

impl NewsPresenter for WidgetPresenter {
    fn show_loading(&self) {
        self.set(WidgetView::Loading);
    }

    fn show_items(&self, items: &[NewsItem]) {
        if items.is_empty() {
            self.set(WidgetView::Hidden);
        } else {
            self.set(WidgetView::Items(items.to_vec()));
        }
    }

    fn show_empty(&self) {
        self.set(WidgetView::Hidden);
    }
}
