use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, info, warn};
use whale_core::{
    dispatch, ActionRequest, GatewayError, Inventory, PendingLedger, PollBatch, ResourceKind,
    Target, Verb,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Page {
    #[default]
    Containers,
    Images,
    Volumes,
    Help,
}

impl Page {
    pub const RESOURCE_PAGES: [Page; 3] = [Page::Containers, Page::Images, Page::Volumes];

    pub fn title(self) -> &'static str {
        match self {
            Page::Containers => "Containers",
            Page::Images => "Images",
            Page::Volumes => "Volumes",
            Page::Help => "Controls",
        }
    }

    pub fn kind(self) -> Option<ResourceKind> {
        match self {
            Page::Containers => Some(ResourceKind::Container),
            Page::Images => Some(ResourceKind::Image),
            Page::Volumes => Some(ResourceKind::Volume),
            Page::Help => None,
        }
    }

    /// Tab order skips the help page.
    pub fn next(self) -> Self {
        match self {
            Page::Containers => Page::Images,
            Page::Images => Page::Volumes,
            Page::Volumes | Page::Help => Page::Containers,
        }
    }

    pub fn prev(self) -> Self {
        match self {
            Page::Containers | Page::Help => Page::Volumes,
            Page::Images => Page::Containers,
            Page::Volumes => Page::Images,
        }
    }
}

#[derive(Debug)]
pub enum SessionEvent {
    Tick(PollBatch),
    Key(KeyEvent),
    Resize(u16, u16),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Fire the call and forget about it; the next polls tell whether it landed.
    Apply(ActionRequest),
    Quit,
}

pub struct App {
    pub inventory: Inventory,
    pub page: Page,
    previous_page: Page,
    /// `None` after a remove until the next tick lands.
    pub cursor: Option<usize>,
    pub selected: BTreeSet<usize>,
    pub ledger: PendingLedger,
    pub blink: bool,
    pub logs: String,
    /// Last poll error per kind; the matching snapshot is stale while present.
    pub poll_errors: HashMap<ResourceKind, String>,
    pub width: u16,
    pub height: u16,
}

impl Default for App {
    fn default() -> Self {
        Self::new()
    }
}

impl App {
    pub fn new() -> Self {
        Self {
            inventory: Inventory::default(),
            page: Page::Containers,
            previous_page: Page::Containers,
            cursor: Some(0),
            selected: BTreeSet::new(),
            ledger: PendingLedger::new(),
            blink: false,
            logs: String::new(),
            poll_errors: HashMap::new(),
            width: 0,
            height: 0,
        }
    }

    pub fn handle(&mut self, event: SessionEvent) -> Vec<Command> {
        match event {
            SessionEvent::Tick(batch) => {
                self.on_tick(batch);
                Vec::new()
            }
            SessionEvent::Key(key) => self.handle_key(key),
            SessionEvent::Resize(width, height) => {
                self.width = width;
                self.height = height;
                Vec::new()
            }
        }
    }

    /// Number of rows on the active page; zero for the help page.
    pub fn active_len(&self) -> usize {
        self.page
            .kind()
            .map(|kind| self.inventory.len_of(kind))
            .unwrap_or(0)
    }

    pub fn is_transitioning(&self, kind: ResourceKind, id: &str) -> bool {
        self.ledger.contains(kind, id)
    }

    pub fn is_selected(&self, index: usize) -> bool {
        self.selected.contains(&index)
    }

    fn on_tick(&mut self, batch: PollBatch) {
        let PollBatch {
            containers,
            images,
            volumes,
        } = batch;
        absorb(
            &mut self.inventory.containers,
            containers,
            ResourceKind::Container,
            &mut self.poll_errors,
        );
        absorb(
            &mut self.inventory.images,
            images,
            ResourceKind::Image,
            &mut self.poll_errors,
        );
        absorb(
            &mut self.inventory.volumes,
            volumes,
            ResourceKind::Volume,
            &mut self.poll_errors,
        );

        let settled = self.ledger.reconcile(&self.inventory);
        if settled > 0 {
            debug!(
                event = "ledger_settled",
                settled,
                pending = self.ledger.len()
            );
        }
        self.blink = !self.blink;
        self.anchor_cursor();
        let len = self.active_len();
        self.selected.retain(|index| *index < len);
    }

    fn anchor_cursor(&mut self) {
        let len = self.active_len();
        self.cursor = match self.cursor {
            None => Some(0),
            Some(index) if len > 0 && index >= len => Some(len - 1),
            other => other,
        };
    }

    fn handle_key(&mut self, key: KeyEvent) -> Vec<Command> {
        if let Some(commands) = self.handle_page_key(key) {
            return commands;
        }
        self.handle_common_key(key)
    }

    fn handle_page_key(&mut self, key: KeyEvent) -> Option<Vec<Command>> {
        if key.modifiers.contains(KeyModifiers::CONTROL) {
            return None;
        }
        let verb = match (self.page, key.code) {
            (Page::Containers, KeyCode::Char('u')) => Verb::Start,
            (Page::Containers, KeyCode::Char('s')) => Verb::Stop,
            (Page::Containers, KeyCode::Char('r')) => Verb::Restart,
            (Page::Containers, KeyCode::Char('p')) => Verb::Pause,
            (Page::Containers, KeyCode::Char('P')) => Verb::Unpause,
            (Page::Containers, KeyCode::Char('K')) => Verb::Kill,
            (Page::Containers | Page::Images | Page::Volumes, KeyCode::Char('X')) => Verb::Remove,
            (Page::Help, KeyCode::Esc) => {
                self.toggle_help();
                return Some(Vec::new());
            }
            _ => return None,
        };
        Some(self.dispatch(verb))
    }

    fn handle_common_key(&mut self, key: KeyEvent) -> Vec<Command> {
        if key.modifiers.contains(KeyModifiers::CONTROL) {
            match key.code {
                KeyCode::Char('c') => return vec![Command::Quit],
                KeyCode::Char('a') => self.select_all(),
                _ => {}
            }
            return Vec::new();
        }

        match key.code {
            KeyCode::Char('q') => return vec![Command::Quit],
            KeyCode::Up | KeyCode::Char('k') => self.move_cursor(-1),
            KeyCode::Down | KeyCode::Char('j') => self.move_cursor(1),
            KeyCode::Char(' ') | KeyCode::Enter => self.toggle_selection(),
            KeyCode::Char('A') => self.select_all(),
            KeyCode::Esc => self.clear(),
            KeyCode::Tab => self.switch_page(self.page.next()),
            KeyCode::BackTab => self.switch_page(self.page.prev()),
            KeyCode::Char('1') => self.switch_page(Page::Containers),
            KeyCode::Char('2') => self.switch_page(Page::Images),
            KeyCode::Char('3') => self.switch_page(Page::Volumes),
            KeyCode::Char('?') => self.toggle_help(),
            _ => {}
        }
        Vec::new()
    }

    fn switch_page(&mut self, page: Page) {
        if self.page != Page::Help {
            self.previous_page = self.page;
        }
        self.page = page;
        self.cursor = Some(0);
        self.selected.clear();
        self.logs.clear();
    }

    fn toggle_help(&mut self) {
        if self.page == Page::Help {
            self.switch_page(self.previous_page);
        } else {
            self.switch_page(Page::Help);
        }
    }

    fn move_cursor(&mut self, delta: isize) {
        let len = self.active_len();
        if len == 0 {
            return;
        }
        let Some(current) = self.cursor else {
            self.cursor = Some(0);
            return;
        };
        let current = current.min(len - 1) as isize;
        let next = (current + delta).rem_euclid(len as isize);
        self.cursor = Some(next as usize);
    }

    fn toggle_selection(&mut self) {
        let Some(cursor) = self.cursor else {
            return;
        };
        if cursor >= self.active_len() {
            return;
        }
        if !self.selected.remove(&cursor) {
            self.selected.insert(cursor);
        }
    }

    fn select_all(&mut self) {
        let len = self.active_len();
        let all_selected = len > 0 && (0..len).all(|index| self.selected.contains(&index));
        if all_selected || len == 0 {
            self.selected.clear();
        } else {
            self.selected = (0..len).collect();
        }
    }

    fn clear(&mut self) {
        self.selected.clear();
        self.logs.clear();
    }

    /// Rows the next action applies to: the selection if any, else the row under the cursor.
    pub fn targets(&self) -> Vec<Target> {
        let Some(kind) = self.page.kind() else {
            return Vec::new();
        };
        if self.selected.is_empty() {
            return self
                .cursor
                .and_then(|cursor| self.inventory.target_at(kind, cursor))
                .into_iter()
                .collect();
        }
        self.selected
            .iter()
            .filter_map(|index| self.inventory.target_at(kind, *index))
            .collect()
    }

    fn dispatch(&mut self, verb: Verb) -> Vec<Command> {
        let Some(kind) = self.page.kind() else {
            return Vec::new();
        };
        let targets = self.targets();
        let outcome = dispatch(&mut self.ledger, verb, &targets, &self.inventory);

        info!(
            event = "dispatch",
            verb = %verb,
            kind = %kind,
            succeeded = outcome.report.succeeded.len(),
            skipped = outcome.report.skipped.len()
        );
        self.logs = outcome.report.summary();
        self.selected.clear();
        // Removed rows vanish on the next poll; indices taken now would point at the wrong row.
        if verb == Verb::Remove {
            self.cursor = None;
        }

        outcome.requests.into_iter().map(Command::Apply).collect()
    }
}

fn absorb<T>(
    snapshot: &mut Vec<T>,
    polled: Result<Vec<T>, GatewayError>,
    kind: ResourceKind,
    errors: &mut HashMap<ResourceKind, String>,
) {
    match polled {
        Ok(records) => {
            *snapshot = records;
            errors.remove(&kind);
        }
        Err(err) => {
            warn!(event = "poll_failed", kind = %kind, error = %err);
            errors.insert(kind, err.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use whale_core::{
        ContainerRecord, ContainerState, DesiredState, ImageRecord, VolumeRecord,
    };

    fn key(code: KeyCode) -> SessionEvent {
        SessionEvent::Key(KeyEvent::new(code, KeyModifiers::NONE))
    }

    fn ch(c: char) -> SessionEvent {
        let modifiers = if c.is_ascii_uppercase() {
            KeyModifiers::SHIFT
        } else {
            KeyModifiers::NONE
        };
        SessionEvent::Key(KeyEvent::new(KeyCode::Char(c), modifiers))
    }

    fn ctrl(c: char) -> SessionEvent {
        SessionEvent::Key(KeyEvent::new(KeyCode::Char(c), KeyModifiers::CONTROL))
    }

    fn container(id: &str, state: ContainerState) -> ContainerRecord {
        ContainerRecord {
            id: id.to_string(),
            name: format!("{id}-svc"),
            state,
            image: "nginx:latest".to_string(),
            image_id: "sha256:nginx".to_string(),
            command: String::new(),
            ip_addresses: Vec::new(),
            status: String::new(),
            ports: Vec::new(),
            volumes: Vec::new(),
        }
    }

    fn image(id: &str, tag: &str) -> ImageRecord {
        ImageRecord {
            id: id.to_string(),
            tags: vec![tag.to_string()],
            size: 1024,
            created: None,
        }
    }

    fn volume(name: &str) -> VolumeRecord {
        VolumeRecord {
            name: name.to_string(),
            driver: "local".to_string(),
            mount_point: format!("/var/lib/docker/volumes/{name}/_data"),
            created: None,
        }
    }

    fn tick(containers: Vec<ContainerRecord>) -> SessionEvent {
        SessionEvent::Tick(PollBatch::ok(containers, Vec::new(), Vec::new()))
    }

    fn app_with(states: &[ContainerState]) -> App {
        let mut app = App::new();
        let containers = states
            .iter()
            .enumerate()
            .map(|(i, state)| container(&format!("id{i}"), *state))
            .collect();
        app.handle(tick(containers));
        app
    }

    fn applied(commands: &[Command]) -> Vec<(Verb, String)> {
        commands
            .iter()
            .filter_map(|c| match c {
                Command::Apply(req) => Some((req.verb, req.id.clone())),
                Command::Quit => None,
            })
            .collect()
    }

    #[test]
    fn select_all_twice_returns_to_empty() {
        let mut app = app_with(&[ContainerState::Running; 4]);
        app.handle(ch(' '));
        app.handle(ch('A'));
        assert_eq!(app.selected.len(), 4);
        app.handle(ch('A'));
        assert!(app.selected.is_empty());

        app.handle(ctrl('a'));
        app.handle(ctrl('a'));
        assert!(app.selected.is_empty());
    }

    #[test]
    fn cursor_wraps_in_both_directions() {
        let mut app = app_with(&[ContainerState::Running; 5]);
        app.handle(ch('j'));
        app.handle(ch('j'));
        let start = app.cursor;
        for _ in 0..5 {
            app.handle(key(KeyCode::Down));
        }
        assert_eq!(app.cursor, start);
        for _ in 0..5 {
            app.handle(ch('k'));
        }
        assert_eq!(app.cursor, start);

        app.handle(ch('1'));
        app.handle(key(KeyCode::Up));
        assert_eq!(app.cursor, Some(4));
    }

    #[test]
    fn navigation_on_empty_collection_is_noop() {
        let mut app = app_with(&[]);
        app.handle(ch('j'));
        app.handle(ch('k'));
        app.handle(ch(' '));
        assert_eq!(app.cursor, Some(0));
        assert!(app.selected.is_empty());
    }

    #[test]
    fn toggle_does_not_move_cursor() {
        let mut app = app_with(&[ContainerState::Running; 3]);
        app.handle(ch('j'));
        app.handle(ch(' '));
        assert_eq!(app.cursor, Some(1));
        assert!(app.is_selected(1));
        app.handle(key(KeyCode::Enter));
        assert!(app.selected.is_empty());
    }

    #[test]
    fn page_switch_resets_cursor_selection_and_log() {
        let switches = [
            key(KeyCode::Tab),
            key(KeyCode::BackTab),
            ch('1'),
            ch('2'),
            ch('3'),
            ch('?'),
        ];
        for switch in switches {
            let mut app = app_with(&[ContainerState::Exited; 3]);
            app.handle(ch('j'));
            app.handle(ch('j'));
            app.handle(ch(' '));
            app.handle(ch('p'));
            app.handle(ch(' '));
            assert!(!app.logs.is_empty());

            app.handle(switch);
            assert_eq!(app.cursor, Some(0));
            assert!(app.selected.is_empty());
            assert!(app.logs.is_empty());
        }
    }

    #[test]
    fn tab_cycles_resource_pages() {
        let mut app = App::new();
        app.handle(key(KeyCode::Tab));
        assert_eq!(app.page, Page::Images);
        app.handle(key(KeyCode::Tab));
        assert_eq!(app.page, Page::Volumes);
        app.handle(key(KeyCode::Tab));
        assert_eq!(app.page, Page::Containers);
    }

    #[test]
    fn help_toggle_returns_to_previous_page() {
        let mut app = App::new();
        app.handle(ch('3'));
        app.handle(ch('?'));
        assert_eq!(app.page, Page::Help);
        app.handle(ch('?'));
        assert_eq!(app.page, Page::Volumes);

        app.handle(ch('?'));
        app.handle(key(KeyCode::Esc));
        assert_eq!(app.page, Page::Volumes);
    }

    #[test]
    fn batch_stop_over_mixed_states() {
        let mut app = app_with(&[
            ContainerState::Running,
            ContainerState::Exited,
            ContainerState::Paused,
        ]);
        app.handle(ch('A'));
        let commands = app.handle(ch('s'));

        assert_eq!(applied(&commands), vec![(Verb::Stop, "id0".to_string())]);
        assert_eq!(
            app.ledger.desired(ResourceKind::Container, "id0"),
            Some(DesiredState::Lifecycle(ContainerState::Exited))
        );
        assert!(!app.is_transitioning(ResourceKind::Container, "id1"));
        assert!(app.logs.contains("1 succeeded, 2 skipped"));
        assert!(app.selected.is_empty());
        assert_eq!(app.cursor, Some(0));
    }

    #[test]
    fn cursor_only_unpause_settles_on_tick() {
        let mut app = app_with(&[ContainerState::Paused]);
        let commands = app.handle(ch('P'));
        assert_eq!(applied(&commands), vec![(Verb::Unpause, "id0".to_string())]);
        assert!(app.is_transitioning(ResourceKind::Container, "id0"));

        app.handle(tick(vec![container("id0", ContainerState::Paused)]));
        assert!(app.is_transitioning(ResourceKind::Container, "id0"));

        app.handle(tick(vec![container("id0", ContainerState::Running)]));
        assert!(app.ledger.is_empty());
    }

    #[test]
    fn remove_overwrites_pending_entry_and_invalidates_cursor() {
        let mut app = app_with(&[ContainerState::Running, ContainerState::Running]);
        app.handle(ch('j'));
        app.handle(ch('p'));
        assert_eq!(
            app.ledger.desired(ResourceKind::Container, "id1"),
            Some(DesiredState::Lifecycle(ContainerState::Paused))
        );

        let commands = app.handle(ch('X'));
        assert_eq!(applied(&commands), vec![(Verb::Remove, "id1".to_string())]);
        assert_eq!(
            app.ledger.desired(ResourceKind::Container, "id1"),
            Some(DesiredState::Removed)
        );
        assert_eq!(app.cursor, None);

        // Before the next poll lands there is nothing to act on.
        assert!(applied(&app.handle(ch('K'))).is_empty());

        app.handle(tick(vec![container("id0", ContainerState::Running)]));
        assert_eq!(app.cursor, Some(0));
        assert!(app.ledger.is_empty());
    }

    #[test]
    fn image_removal_blocked_by_running_container() {
        let mut app = App::new();
        app.handle(SessionEvent::Tick(PollBatch::ok(
            vec![container("c1", ContainerState::Running)],
            vec![image("sha256:nginx", "nginx:latest")],
            Vec::new(),
        )));
        app.handle(ch('2'));
        let commands = app.handle(ch('X'));

        assert!(commands.is_empty());
        assert!(app.ledger.is_empty());
        assert!(app.logs.contains("0 succeeded, 1 skipped"));
        assert_eq!(app.cursor, None);
    }

    #[test]
    fn container_verbs_are_ignored_off_the_container_page() {
        let mut app = App::new();
        app.handle(SessionEvent::Tick(PollBatch::ok(
            Vec::new(),
            Vec::new(),
            vec![volume("data"), volume("cache")],
        )));
        app.handle(ch('3'));
        for c in ['u', 's', 'r', 'p', 'P', 'K'] {
            assert!(app.handle(ch(c)).is_empty());
        }
        assert!(app.logs.is_empty());

        app.handle(ch('A'));
        let commands = app.handle(ch('X'));
        assert_eq!(commands.len(), 2);
        assert!(app.is_transitioning(ResourceKind::Volume, "cache"));
    }

    #[test]
    fn failed_poll_keeps_stale_snapshot_and_refreshes_others() {
        let mut app = app_with(&[ContainerState::Running, ContainerState::Exited]);
        app.handle(SessionEvent::Tick(PollBatch {
            containers: Err(GatewayError::Timeout(2000)),
            images: Ok(vec![image("sha256:a", "a:1")]),
            volumes: Ok(vec![volume("v")]),
        }));

        assert_eq!(app.inventory.containers.len(), 2);
        assert_eq!(app.inventory.images.len(), 1);
        assert_eq!(app.inventory.volumes.len(), 1);
        assert!(app.poll_errors.contains_key(&ResourceKind::Container));

        app.handle(tick(vec![container("id0", ContainerState::Running)]));
        assert!(app.poll_errors.is_empty());
        assert_eq!(app.inventory.containers.len(), 1);
    }

    #[test]
    fn tick_keeps_selection_and_log_and_flips_blink() {
        let mut app = app_with(&[ContainerState::Running, ContainerState::Running]);
        app.handle(ch(' '));
        app.handle(ch('j'));
        app.handle(ch('s'));
        app.handle(ch(' '));
        let log = app.logs.clone();
        let blink = app.blink;

        app.handle(tick(vec![
            container("id0", ContainerState::Running),
            container("id1", ContainerState::Running),
        ]));

        assert_eq!(app.logs, log);
        assert!(app.is_selected(1));
        assert_ne!(app.blink, blink);
    }

    #[test]
    fn tick_clamps_cursor_when_snapshot_shrinks() {
        let mut app = app_with(&[ContainerState::Running; 3]);
        app.handle(ch('k'));
        assert_eq!(app.cursor, Some(2));
        app.handle(tick(vec![container("id0", ContainerState::Running)]));
        assert_eq!(app.cursor, Some(0));
    }

    #[test]
    fn tick_drops_selected_rows_that_no_longer_exist() {
        let mut app = app_with(&[ContainerState::Running; 4]);
        app.handle(ch(' '));
        app.handle(ch('k'));
        app.handle(ch(' '));
        assert_eq!(app.selected.len(), 2);

        app.handle(tick(vec![
            container("id0", ContainerState::Running),
            container("id1", ContainerState::Running),
        ]));

        assert_eq!(app.selected.iter().copied().collect::<Vec<_>>(), vec![0]);
        assert_eq!(app.targets().len(), 1);
    }

    #[test]
    fn escape_clears_selection_and_log() {
        let mut app = app_with(&[ContainerState::Exited; 2]);
        app.handle(ch('A'));
        app.handle(ch('u'));
        app.handle(ch('A'));
        app.handle(key(KeyCode::Esc));
        assert!(app.selected.is_empty());
        assert!(app.logs.is_empty());
    }

    #[test]
    fn quit_and_resize() {
        let mut app = App::new();
        assert!(app.handle(SessionEvent::Resize(120, 40)).is_empty());
        assert_eq!((app.width, app.height), (120, 40));
        assert_eq!(app.handle(ch('q')), vec![Command::Quit]);
        assert_eq!(app.handle(ctrl('c')), vec![Command::Quit]);
    }
}
