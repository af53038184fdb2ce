use ratatui::Frame;

use crate::{
    ui::{forms, history::render_history},
    App, AppState,
};

/// A UI Screen boundary: responsible for rendering one app state
pub trait Screen {
    fn render(&self, app: &App, f: &mut Frame);
}

/// Main screen - session clock, laps and countdown table
pub struct TrackingScreen;

impl Screen for TrackingScreen {
    fn render(&self, app: &App, f: &mut Frame) {
        f.render_widget(app, f.area());
    }
}

pub struct HistoryScreen;

impl Screen for HistoryScreen {
    fn render(&self, app: &App, f: &mut Frame) {
        render_history(app, f);
    }
}

/// Tracking screen with the add-countdown form on top
pub struct AddGoalScreen;

impl Screen for AddGoalScreen {
    fn render(&self, app: &App, f: &mut Frame) {
        f.render_widget(app, f.area());
        forms::render_goal_form(&app.form, f);
    }
}

pub struct ConfirmDeleteScreen<'a> {
    pub name: &'a str,
}

impl Screen for ConfirmDeleteScreen<'_> {
    fn render(&self, app: &App, f: &mut Frame) {
        f.render_widget(app, f.area());
        forms::render_confirm_delete(self.name, f);
    }
}

/// Helper to construct the appropriate screen for the current state
pub fn current_screen(state: &AppState) -> Box<dyn Screen + '_> {
    match state {
        AppState::Tracking => Box::new(TrackingScreen),
        AppState::History => Box::new(HistoryScreen),
        AppState::AddGoal => Box::new(AddGoalScreen),
        AppState::ConfirmDelete(name) => Box::new(ConfirmDeleteScreen { name }),
    }
}
