use std::collections::HashMap;

/// On-screen control buttons of the map window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Button {
    AddRegion,
    ScaleUp,
    ScaleDown,
    Pause,
    TopTen,
    TopTwenty,
    ClearAll,
}

/// What the host saw: a key press (case-insensitive) or a button click.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Trigger {
    Key(char),
    Button(Button),
}

impl Trigger {
    fn normalized(self) -> Self {
        match self {
            Trigger::Key(c) => Trigger::Key(c.to_ascii_uppercase()),
            other => other,
        }
    }
}

/// Commands the coordinator executes on behalf of the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    /// Add or remove the hovered region from the chart.
    ToggleHoveredRegion,
    ScaleUp,
    ScaleDown,
    TogglePause,
    /// Highlight the top N regions; 0 clears the chart.
    SetTopN(usize),
}

/// Trigger to command map.
pub struct CommandBindings {
    map: HashMap<Trigger, Command>,
    reverse: HashMap<Command, Trigger>,
}

impl CommandBindings {
    pub fn defaults() -> Self {
        let mut map = HashMap::new();
        let mut reverse = HashMap::new();
        let mut bind = |trigger: Trigger, command: Command| {
            map.insert(trigger, command);
            reverse.entry(command).or_insert(trigger);
        };

        bind(Trigger::Key('L'), Command::ToggleHoveredRegion);
        bind(Trigger::Key('S'), Command::ScaleUp);
        bind(Trigger::Key('A'), Command::ScaleDown);
        bind(Trigger::Key('P'), Command::TogglePause);
        bind(Trigger::Button(Button::AddRegion), Command::ToggleHoveredRegion);
        bind(Trigger::Button(Button::ScaleUp), Command::ScaleUp);
        bind(Trigger::Button(Button::ScaleDown), Command::ScaleDown);
        bind(Trigger::Button(Button::Pause), Command::TogglePause);
        bind(Trigger::Button(Button::TopTen), Command::SetTopN(10));
        bind(Trigger::Button(Button::TopTwenty), Command::SetTopN(20));
        bind(Trigger::Button(Button::ClearAll), Command::SetTopN(0));

        Self { map, reverse }
    }

    pub fn lookup(&self, trigger: Trigger) -> Option<Command> {
        self.map.get(&trigger.normalized()).copied()
    }

    /// Rebind a trigger, replacing whatever it did before.
    pub fn bind(&mut self, trigger: Trigger, command: Command) {
        let trigger = trigger.normalized();
        self.map.insert(trigger, command);
        self.reverse.insert(command, trigger);
    }

    /// Display label for the first trigger bound to a command.
    pub fn label_for(&self, command: Command) -> Option<String> {
        self.reverse.get(&command).map(|trigger| match trigger {
            Trigger::Key(c) => c.to_string(),
            Trigger::Button(b) => button_label(*b).to_string(),
        })
    }
}

fn button_label(button: Button) -> &'static str {
    match button {
        Button::AddRegion => "Add/Remove",
        Button::ScaleUp => "Scale +",
        Button::ScaleDown => "Scale -",
        Button::Pause => "Pause",
        Button::TopTen => "Top 10",
        Button::TopTwenty => "Top 20",
        Button::ClearAll => "Clear",
    }
}
