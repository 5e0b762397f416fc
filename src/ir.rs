use crate::error::{CompileError, CompileResult};

/// Declares a closed enumeration whose values come from block fields.
/// The first tag of each variant is its canonical spelling.
macro_rules! field_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $label:literal {
            $($variant:ident => [$first:literal $(, $alias:literal)*]),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const NAME: &'static str = $label;
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn from_field(raw: &str) -> CompileResult<Self> {
                match raw.trim() {
                    $($first $(| $alias)* => Ok($name::$variant),)+
                    other => Err(CompileError::invalid_enum($label, other)),
                }
            }

            pub fn tag(self) -> &'static str {
                match self {
                    $($name::$variant => $first,)+
                }
            }
        }
    };
}

field_enum!(TurnDirection, "TurnDirection" {
    Clockwise => ["clockwise", "cw"],
    CounterClockwise => ["counterclockwise", "ccw"],
});

field_enum!(MotorUnit, "Unit" {
    Rotations => ["rotations"],
    Seconds => ["seconds"],
    Degrees => ["degrees"],
});

field_enum!(GoDirection, "GoDirection" {
    Shortest => ["shortest"],
    Clockwise => ["clockwise"],
    CounterClockwise => ["counterclockwise"],
});

field_enum!(DistanceUnit, "DistanceUnit" {
    Cm => ["cm"],
    Inches => ["inches", "in"],
    Percent => ["%", "percent"],
});

field_enum!(Comparator, "Comparator" {
    Less => ["<"],
    Equal => ["="],
    Greater => [">"],
});

field_enum!(HubOrientation, "HubOrientation" {
    Front => ["front"],
    Back => ["back"],
    Up => ["up"],
    Down => ["down"],
    LeftSide => ["leftside"],
    RightSide => ["rightside"],
});

field_enum!(AngleUnit, "AngleUnit" {
    Pitch => ["pitch"],
    Roll => ["roll"],
    Yaw => ["yaw"],
});

field_enum!(ButtonType, "ButtonType" {
    Left => ["left"],
    Right => ["right"],
});

field_enum!(ButtonAction, "ButtonAction" {
    Pressed => ["pressed"],
    Released => ["released"],
});

field_enum!(HubInteraction, "HubInteraction" {
    Shaken => ["shake", "shaken"],
    Tapped => ["tapped", "tap"],
    Falling => ["falling", "freefall"],
});

field_enum!(MoveDirection, "MoveDirection" {
    Forward => ["forward"],
    Back => ["back", "backward"],
    Clockwise => ["clockwise"],
    CounterClockwise => ["counterclockwise"],
});

field_enum!(MoveUnit, "MoveUnit" {
    Cm => ["cm"],
    Inches => ["inches", "in"],
    Rotations => ["rotations"],
    Degrees => ["degrees"],
    Seconds => ["seconds"],
});

field_enum!(ArithOp, "ArithmeticOperator" {
    Add => ["+"],
    Sub => ["-"],
    Mul => ["*"],
    Div => ["/"],
});

field_enum!(MathFunc, "MathFunction" {
    Abs => ["abs"],
    Floor => ["floor"],
    Ceiling => ["ceiling"],
    Sqrt => ["sqrt"],
    Sin => ["sin"],
    Cos => ["cos"],
    Tan => ["tan"],
    Asin => ["asin"],
    Acos => ["acos"],
    Atan => ["atan"],
    Atan2 => ["atan2"],
    Ln => ["ln"],
    Log => ["log"],
    Exp => ["e ^", "e^"],
    Pow10 => ["10 ^", "10^"],
    Pow => ["pow"],
    Min => ["min"],
    Max => ["max"],
    CopySign => ["copysign"],
    Hypot => ["hypot"],
});

impl MathFunc {
    pub fn arity(self) -> usize {
        match self {
            MathFunc::Atan2
            | MathFunc::Pow
            | MathFunc::Min
            | MathFunc::Max
            | MathFunc::CopySign
            | MathFunc::Hypot => 2,
            _ => 1,
        }
    }
}

/// Colours reported by the colour sensor, keyed by palette index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SensorColor {
    None,
    Black,
    Violet,
    Blue,
    Azure,
    Green,
    Yellow,
    Red,
    White,
}

impl SensorColor {
    pub const NAME: &'static str = "SensorColor";
    pub const ALL: &'static [SensorColor] = &[
        SensorColor::None,
        SensorColor::Black,
        SensorColor::Violet,
        SensorColor::Blue,
        SensorColor::Azure,
        SensorColor::Green,
        SensorColor::Yellow,
        SensorColor::Red,
        SensorColor::White,
    ];

    pub fn index(self) -> i64 {
        match self {
            SensorColor::None => -1,
            SensorColor::Black => 0,
            SensorColor::Violet => 1,
            SensorColor::Blue => 3,
            SensorColor::Azure => 4,
            SensorColor::Green => 5,
            SensorColor::Yellow => 7,
            SensorColor::Red => 9,
            SensorColor::White => 10,
        }
    }

    pub fn from_index(index: i64) -> CompileResult<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.index() == index)
            .ok_or_else(|| CompileError::InvalidIndex {
                enum_name: Self::NAME,
                index: index.to_string(),
            })
    }
}

/// Colours of the hub's centre button light. Same palette as the sensor, minus "no colour".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CenterButtonColor {
    Black,
    Violet,
    Blue,
    Azure,
    Green,
    Yellow,
    Red,
    White,
}

impl CenterButtonColor {
    pub const NAME: &'static str = "CenterButtonColor";
    pub const ALL: &'static [CenterButtonColor] = &[
        CenterButtonColor::Black,
        CenterButtonColor::Violet,
        CenterButtonColor::Blue,
        CenterButtonColor::Azure,
        CenterButtonColor::Green,
        CenterButtonColor::Yellow,
        CenterButtonColor::Red,
        CenterButtonColor::White,
    ];

    pub fn index(self) -> i64 {
        match self {
            CenterButtonColor::Black => 0,
            CenterButtonColor::Violet => 1,
            CenterButtonColor::Blue => 3,
            CenterButtonColor::Azure => 4,
            CenterButtonColor::Green => 5,
            CenterButtonColor::Yellow => 7,
            CenterButtonColor::Red => 9,
            CenterButtonColor::White => 10,
        }
    }

    pub fn from_index(index: i64) -> CompileResult<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.index() == index)
            .ok_or_else(|| CompileError::InvalidIndex {
                enum_name: Self::NAME,
                index: index.to_string(),
            })
    }
}

/// Visual constructs with no faithful Python translation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnsupportedFeature {
    Animations,
    ParallelStacks,
    PitchEffects,
    OrientationRotations,
    StopBlocks,
}

impl UnsupportedFeature {
    pub fn description(self) -> &'static str {
        match self {
            UnsupportedFeature::Animations => "animations",
            UnsupportedFeature::ParallelStacks => "parallel stacks",
            UnsupportedFeature::PitchEffects => "pitch effects",
            UnsupportedFeature::OrientationRotations => "orientation rotations",
            UnsupportedFeature::StopBlocks => "stop blocks",
        }
    }
}

/// A variable or list referenced by name and manifest id.
#[derive(Debug, Clone, PartialEq)]
pub struct Reference {
    pub name: String,
    pub id: String,
}

impl Reference {
    pub fn new(name: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: id.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Text(String),
    PortList(Vec<char>),
    Variable(Reference),
    Arithmetic {
        op: ArithOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Comparison {
        op: Comparator,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
    Between {
        value: Box<Expr>,
        low: Box<Expr>,
        high: Box<Expr>,
    },
    Join(Box<Expr>, Box<Expr>),
    LetterOf {
        index: Box<Expr>,
        text: Box<Expr>,
    },
    Length(Box<Expr>),
    Contains {
        text: Box<Expr>,
        needle: Box<Expr>,
    },
    Modulo(Box<Expr>, Box<Expr>),
    Round(Box<Expr>),
    MathFunction {
        func: MathFunc,
        arg: Box<Expr>,
        arg2: Option<Box<Expr>>,
    },
    Random {
        low: Box<Expr>,
        high: Box<Expr>,
    },
    MotorPosition {
        port: Box<Expr>,
    },
    MotorSpeed {
        port: Box<Expr>,
    },
    Color {
        port: Box<Expr>,
    },
    IsColor {
        port: Box<Expr>,
        color: Box<Expr>,
    },
    ReflectedLight {
        port: Box<Expr>,
    },
    IsReflectedLight {
        port: Box<Expr>,
        comparator: Comparator,
        value: Box<Expr>,
    },
    Distance {
        port: Box<Expr>,
        unit: DistanceUnit,
    },
    IsDistance {
        port: Box<Expr>,
        comparator: Comparator,
        value: Box<Expr>,
        unit: DistanceUnit,
    },
    Gesture,
    IsGesture(HubInteraction),
    Orientation,
    IsOrientation(HubOrientation),
    HubAngle(AngleUnit),
    IsButton {
        button: ButtonType,
        action: ButtonAction,
    },
    TimerValue,
    Volume,
    KeyPressed {
        key: Box<Expr>,
    },
    ItemOfList {
        list: Reference,
        index: Box<Expr>,
    },
    IndexOfItem {
        list: Reference,
        item: Box<Expr>,
    },
    LengthOfList {
        list: Reference,
    },
    ListContains {
        list: Reference,
        item: Box<Expr>,
    },
}

impl Expr {
    pub fn number(value: f64) -> Self {
        Expr::Number(value)
    }

    pub fn text(value: impl Into<String>) -> Self {
        Expr::Text(value.into())
    }

    pub fn ports(letters: &str) -> Self {
        Expr::PortList(letters.chars().collect())
    }

    pub fn variable(name: impl Into<String>, id: impl Into<String>) -> Self {
        Expr::Variable(Reference::new(name, id))
    }

    /// Boolean-valued expressions, usable as conditions.
    pub fn is_predicate(&self) -> bool {
        matches!(
            self,
            Expr::Comparison { .. }
                | Expr::And(..)
                | Expr::Or(..)
                | Expr::Not(..)
                | Expr::Between { .. }
                | Expr::Contains { .. }
                | Expr::ListContains { .. }
                | Expr::IsColor { .. }
                | Expr::IsReflectedLight { .. }
                | Expr::IsDistance { .. }
                | Expr::IsGesture(..)
                | Expr::IsOrientation(..)
                | Expr::IsButton { .. }
                | Expr::KeyPressed { .. }
        )
    }

    /// Owned sub-expressions in source order.
    pub fn children(&self) -> Vec<&Expr> {
        match self {
            Expr::Number(_)
            | Expr::Text(_)
            | Expr::PortList(_)
            | Expr::Variable(_)
            | Expr::Gesture
            | Expr::IsGesture(_)
            | Expr::Orientation
            | Expr::IsOrientation(_)
            | Expr::HubAngle(_)
            | Expr::IsButton { .. }
            | Expr::TimerValue
            | Expr::Volume
            | Expr::LengthOfList { .. } => Vec::new(),
            Expr::Arithmetic { lhs, rhs, .. }
            | Expr::Comparison { lhs, rhs, .. }
            | Expr::And(lhs, rhs)
            | Expr::Or(lhs, rhs)
            | Expr::Join(lhs, rhs)
            | Expr::Modulo(lhs, rhs) => vec![lhs.as_ref(), rhs.as_ref()],
            Expr::Not(operand) | Expr::Length(operand) | Expr::Round(operand) => {
                vec![operand.as_ref()]
            }
            Expr::Between { value, low, high } => vec![value.as_ref(), low.as_ref(), high.as_ref()],
            Expr::LetterOf { index, text } => vec![index.as_ref(), text.as_ref()],
            Expr::Contains { text, needle } => vec![text.as_ref(), needle.as_ref()],
            Expr::MathFunction { arg, arg2, .. } => std::iter::once(arg.as_ref())
                .chain(arg2.as_deref())
                .collect(),
            Expr::Random { low, high } => vec![low.as_ref(), high.as_ref()],
            Expr::MotorPosition { port }
            | Expr::MotorSpeed { port }
            | Expr::Color { port }
            | Expr::ReflectedLight { port }
            | Expr::Distance { port, .. } => vec![port.as_ref()],
            Expr::IsColor { port, color } => vec![port.as_ref(), color.as_ref()],
            Expr::IsReflectedLight { port, value, .. } | Expr::IsDistance { port, value, .. } => {
                vec![port.as_ref(), value.as_ref()]
            }
            Expr::KeyPressed { key } => vec![key.as_ref()],
            Expr::ItemOfList { index, .. } => vec![index.as_ref()],
            Expr::IndexOfItem { item, .. } | Expr::ListContains { item, .. } => vec![item.as_ref()],
        }
    }

    pub fn label(&self) -> String {
        match self {
            Expr::Number(v) => format!("Numerical({})", v),
            Expr::Text(s) => format!("Literal(\"{}\")", s),
            Expr::PortList(ports) => format!("ListLiteral({})", ports.iter().collect::<String>()),
            Expr::Variable(r) => format!("Variable({})", r.name),
            Expr::Arithmetic { op, .. } => format!("Arithmetic({})", op.tag()),
            Expr::Comparison { op, .. } => format!("Comparison({})", op.tag()),
            Expr::And(..) => "And".to_string(),
            Expr::Or(..) => "Or".to_string(),
            Expr::Not(..) => "Not".to_string(),
            Expr::Between { .. } => "Between".to_string(),
            Expr::Join(..) => "Join".to_string(),
            Expr::LetterOf { .. } => "LetterOf".to_string(),
            Expr::Length(..) => "Length".to_string(),
            Expr::Contains { .. } => "Contains".to_string(),
            Expr::Modulo(..) => "Mod".to_string(),
            Expr::Round(..) => "Round".to_string(),
            Expr::MathFunction { func, .. } => format!("MathFunction({})", func.tag()),
            Expr::Random { .. } => "Random".to_string(),
            Expr::MotorPosition { .. } => "MotorPosition".to_string(),
            Expr::MotorSpeed { .. } => "MotorSpeed".to_string(),
            Expr::Color { .. } => "Color".to_string(),
            Expr::IsColor { .. } => "IsColor".to_string(),
            Expr::ReflectedLight { .. } => "ReflectedLight".to_string(),
            Expr::IsReflectedLight { comparator, .. } => {
                format!("IsReflectedLight({})", comparator.tag())
            }
            Expr::Distance { unit, .. } => format!("Distance({})", unit.tag()),
            Expr::IsDistance {
                comparator, unit, ..
            } => format!("IsDistance({}, {})", comparator.tag(), unit.tag()),
            Expr::Gesture => "Gesture".to_string(),
            Expr::IsGesture(g) => format!("HubInteraction({})", g.tag()),
            Expr::Orientation => "Orientation".to_string(),
            Expr::IsOrientation(o) => format!("IsOrientation({})", o.tag()),
            Expr::HubAngle(axis) => format!("HubAngle({})", axis.tag()),
            Expr::IsButton { button, action } => {
                format!("Button({}, {})", button.tag(), action.tag())
            }
            Expr::TimerValue => "Timer".to_string(),
            Expr::Volume => "Volume".to_string(),
            Expr::KeyPressed { .. } => "KeyPressed".to_string(),
            Expr::ItemOfList { list, .. } => format!("ItemOfList({})", list.name),
            Expr::IndexOfItem { list, .. } => format!("IndexOfItem({})", list.name),
            Expr::LengthOfList { list } => format!("LengthOfList({})", list.name),
            Expr::ListContains { list, .. } => format!("ListContains({})", list.name),
        }
    }
}

pub type Body = Option<Box<Stmt>>;

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    WhenProgramStarts {
        x: Option<f64>,
        y: Option<f64>,
    },
    SetVariable {
        var: Reference,
        value: Expr,
    },
    ChangeVariable {
        var: Reference,
        value: Expr,
    },
    AddItemToList {
        list: Reference,
        item: Expr,
    },
    DeleteItem {
        list: Reference,
        index: Expr,
    },
    DeleteAllItems {
        list: Reference,
    },
    InsertAt {
        list: Reference,
        item: Expr,
        index: Expr,
    },
    ReplaceAt {
        list: Reference,
        index: Expr,
        item: Expr,
    },
    RunMotorForDuration {
        ports: Expr,
        direction: TurnDirection,
        value: Expr,
        unit: MotorUnit,
    },
    MotorGoToPosition {
        ports: Expr,
        direction: GoDirection,
        position: Expr,
    },
    StartMotor {
        ports: Expr,
        direction: TurnDirection,
    },
    StopMotor {
        ports: Expr,
    },
    SetMotorSpeed {
        ports: Expr,
        speed: Expr,
    },
    Move {
        direction: MoveDirection,
        value: Expr,
        unit: MoveUnit,
    },
    MoveWithSteering {
        steering: Expr,
        value: Expr,
        unit: MoveUnit,
    },
    StartMoving {
        direction: MoveDirection,
    },
    StartSteering {
        steering: Expr,
    },
    StopMoving,
    SetMovementSpeed {
        speed: Expr,
    },
    SetMovementMotors {
        ports: Expr,
    },
    SetMotorRotation {
        distance: Expr,
        unit: DistanceUnit,
    },
    TurnOnFor {
        pattern: Expr,
        duration: Expr,
    },
    TurnOn {
        pattern: Expr,
    },
    Write {
        text: Expr,
    },
    TurnOff,
    SetPixelBrightness {
        brightness: Expr,
    },
    SetPixel {
        x: Expr,
        y: Expr,
        brightness: Expr,
    },
    SetCenterButton {
        color: Expr,
    },
    LightUpDistanceSensor {
        port: Expr,
        pattern: Expr,
    },
    PlaySoundUntilDone {
        sound: String,
    },
    StartSound {
        sound: String,
    },
    PlayBeep {
        note: Expr,
        duration: Expr,
    },
    StartBeep {
        note: Expr,
    },
    StopBeep,
    SetVolume {
        volume: Expr,
    },
    ChangeVolume {
        volume: Expr,
    },
    WaitForSeconds {
        duration: Expr,
    },
    WaitUntil {
        condition: Expr,
    },
    RepeatLoop {
        times: Expr,
        body: Body,
    },
    ForeverLoop {
        body: Body,
    },
    RepeatUntil {
        condition: Expr,
        body: Body,
    },
    IfThen {
        condition: Expr,
        body: Body,
    },
    IfElse {
        condition: Expr,
        body: Body,
        else_body: Body,
    },
    ResetTimer,
    SetYawAngle,
    /// `feature` is `None` for opcodes only tolerated in best-effort mode.
    Placeholder {
        block: String,
        feature: Option<UnsupportedFeature>,
    },
}

/// A statement and the rest of its stack.
#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub next: Body,
}

/// Either kind of IR node, as seen by traversals.
#[derive(Debug, Clone, Copy)]
pub enum NodeRef<'a> {
    Expr(&'a Expr),
    Stmt(&'a Stmt),
}

impl<'a> NodeRef<'a> {
    pub fn label(&self) -> String {
        match self {
            NodeRef::Expr(e) => e.label(),
            NodeRef::Stmt(s) => s.label(),
        }
    }

    pub fn children(&self) -> Vec<NodeRef<'a>> {
        match self {
            NodeRef::Expr(e) => e.children().into_iter().map(NodeRef::Expr).collect(),
            NodeRef::Stmt(s) => s.children(),
        }
    }

    /// The `next` sibling; only statements have one.
    pub fn tail(&self) -> Option<&'a Stmt> {
        match self {
            NodeRef::Expr(_) => None,
            NodeRef::Stmt(s) => s.next.as_deref(),
        }
    }
}

impl Stmt {
    pub fn new(kind: StmtKind) -> Self {
        Self { kind, next: None }
    }

    pub fn with_next(kind: StmtKind, next: Option<Stmt>) -> Self {
        Self {
            kind,
            next: next.map(Box::new),
        }
    }

    /// Links `stmts` into a chain, first element at the head.
    pub fn chain(stmts: Vec<StmtKind>) -> Option<Stmt> {
        stmts
            .into_iter()
            .rev()
            .fold(None, |next, kind| Some(Stmt::with_next(kind, next)))
    }

    pub fn iter(&self) -> ChainIter<'_> {
        ChainIter {
            current: Some(self),
        }
    }

    pub fn is_hat(&self) -> bool {
        matches!(self.kind, StmtKind::WhenProgramStarts { .. })
    }

    /// Structural sub-nodes in source order; never includes `next`.
    pub fn children(&self) -> Vec<NodeRef<'_>> {
        fn e(expr: &Expr) -> NodeRef<'_> {
            NodeRef::Expr(expr)
        }
        fn body<'a>(out: &mut Vec<NodeRef<'a>>, body: &'a Body) {
            if let Some(head) = body.as_deref() {
                out.push(NodeRef::Stmt(head));
            }
        }

        let mut out = Vec::new();
        match &self.kind {
            StmtKind::WhenProgramStarts { .. }
            | StmtKind::DeleteAllItems { .. }
            | StmtKind::StartMoving { .. }
            | StmtKind::StopMoving
            | StmtKind::TurnOff
            | StmtKind::PlaySoundUntilDone { .. }
            | StmtKind::StartSound { .. }
            | StmtKind::StopBeep
            | StmtKind::ResetTimer
            | StmtKind::SetYawAngle
            | StmtKind::Placeholder { .. } => {}
            StmtKind::SetVariable { value, .. } | StmtKind::ChangeVariable { value, .. } => {
                out.push(e(value))
            }
            StmtKind::AddItemToList { item, .. } => out.push(e(item)),
            StmtKind::DeleteItem { index, .. } => out.push(e(index)),
            StmtKind::InsertAt { item, index, .. } => out.extend([e(item), e(index)]),
            StmtKind::ReplaceAt { index, item, .. } => out.extend([e(index), e(item)]),
            StmtKind::RunMotorForDuration { ports, value, .. } => {
                out.extend([e(ports), e(value)])
            }
            StmtKind::MotorGoToPosition {
                ports, position, ..
            } => out.extend([e(ports), e(position)]),
            StmtKind::StartMotor { ports, .. }
            | StmtKind::StopMotor { ports }
            | StmtKind::SetMovementMotors { ports } => out.push(e(ports)),
            StmtKind::SetMotorSpeed { ports, speed } => out.extend([e(ports), e(speed)]),
            StmtKind::Move { value, .. } => out.push(e(value)),
            StmtKind::MoveWithSteering {
                steering, value, ..
            } => out.extend([e(steering), e(value)]),
            StmtKind::StartSteering { steering } => out.push(e(steering)),
            StmtKind::SetMovementSpeed { speed } => out.push(e(speed)),
            StmtKind::SetMotorRotation { distance, .. } => out.push(e(distance)),
            StmtKind::TurnOnFor { pattern, duration } => out.extend([e(pattern), e(duration)]),
            StmtKind::TurnOn { pattern } => out.push(e(pattern)),
            StmtKind::Write { text } => out.push(e(text)),
            StmtKind::SetPixelBrightness { brightness } => out.push(e(brightness)),
            StmtKind::SetPixel { x, y, brightness } => out.extend([e(x), e(y), e(brightness)]),
            StmtKind::SetCenterButton { color } => out.push(e(color)),
            StmtKind::LightUpDistanceSensor { port, pattern } => {
                out.extend([e(port), e(pattern)])
            }
            StmtKind::PlayBeep { note, duration } => out.extend([e(note), e(duration)]),
            StmtKind::StartBeep { note } => out.push(e(note)),
            StmtKind::SetVolume { volume } | StmtKind::ChangeVolume { volume } => {
                out.push(e(volume))
            }
            StmtKind::WaitForSeconds { duration } => out.push(e(duration)),
            StmtKind::WaitUntil { condition } => out.push(e(condition)),
            StmtKind::RepeatLoop { times, body: b } => {
                out.push(e(times));
                body(&mut out, b);
            }
            StmtKind::ForeverLoop { body: b } => body(&mut out, b),
            StmtKind::RepeatUntil { condition, body: b } | StmtKind::IfThen { condition, body: b } => {
                out.push(e(condition));
                body(&mut out, b);
            }
            StmtKind::IfElse {
                condition,
                body: b,
                else_body,
            } => {
                out.push(e(condition));
                body(&mut out, b);
                body(&mut out, else_body);
            }
        }
        out
    }

    pub fn label(&self) -> String {
        match &self.kind {
            StmtKind::WhenProgramStarts { .. } => "WhenProgramStarts".to_string(),
            StmtKind::SetVariable { var, .. } => format!("SetVariable({})", var.name),
            StmtKind::ChangeVariable { var, .. } => format!("ChangeVariable({})", var.name),
            StmtKind::AddItemToList { list, .. } => format!("AddItemToList({})", list.name),
            StmtKind::DeleteItem { list, .. } => format!("DeleteItem({})", list.name),
            StmtKind::DeleteAllItems { list } => format!("DeleteAllItems({})", list.name),
            StmtKind::InsertAt { list, .. } => format!("InsertAt({})", list.name),
            StmtKind::ReplaceAt { list, .. } => format!("ReplaceAt({})", list.name),
            StmtKind::RunMotorForDuration {
                direction, unit, ..
            } => format!("RunMotorForDuration({}, {})", direction.tag(), unit.tag()),
            StmtKind::MotorGoToPosition { direction, .. } => {
                format!("MotorGoToPosition({})", direction.tag())
            }
            StmtKind::StartMotor { direction, .. } => format!("StartMotor({})", direction.tag()),
            StmtKind::StopMotor { .. } => "StopMotor".to_string(),
            StmtKind::SetMotorSpeed { .. } => "SetMotorSpeed".to_string(),
            StmtKind::Move {
                direction, unit, ..
            } => format!("Move({}, {})", direction.tag(), unit.tag()),
            StmtKind::MoveWithSteering { unit, .. } => format!("MoveWithSteering({})", unit.tag()),
            StmtKind::StartMoving { direction } => format!("StartMoving({})", direction.tag()),
            StmtKind::StartSteering { .. } => "StartSteering".to_string(),
            StmtKind::StopMoving => "StopMoving".to_string(),
            StmtKind::SetMovementSpeed { .. } => "SetMovementSpeed".to_string(),
            StmtKind::SetMovementMotors { .. } => "SetMovementMotors".to_string(),
            StmtKind::SetMotorRotation { unit, .. } => format!("SetMotorRotation({})", unit.tag()),
            StmtKind::TurnOnFor { .. } => "TurnOnForDuration".to_string(),
            StmtKind::TurnOn { .. } => "TurnOn".to_string(),
            StmtKind::Write { .. } => "Write".to_string(),
            StmtKind::TurnOff => "TurnOff".to_string(),
            StmtKind::SetPixelBrightness { .. } => "SetPixelBrightness".to_string(),
            StmtKind::SetPixel { .. } => "SetPixel".to_string(),
            StmtKind::SetCenterButton { .. } => "SetCenterButton".to_string(),
            StmtKind::LightUpDistanceSensor { .. } => "LightUpDistanceSensor".to_string(),
            StmtKind::PlaySoundUntilDone { sound } => format!("PlaySoundUntilDone({})", sound),
            StmtKind::StartSound { sound } => format!("StartSound({})", sound),
            StmtKind::PlayBeep { .. } => "PlayBeep".to_string(),
            StmtKind::StartBeep { .. } => "StartBeep".to_string(),
            StmtKind::StopBeep => "StopBeep".to_string(),
            StmtKind::SetVolume { .. } => "SetVolume".to_string(),
            StmtKind::ChangeVolume { .. } => "ChangeVolume".to_string(),
            StmtKind::WaitForSeconds { .. } => "WaitForSeconds".to_string(),
            StmtKind::WaitUntil { .. } => "WaitUntil".to_string(),
            StmtKind::RepeatLoop { .. } => "RepeatLoop".to_string(),
            StmtKind::ForeverLoop { .. } => "ForeverLoop".to_string(),
            StmtKind::RepeatUntil { .. } => "RepeatUntil".to_string(),
            StmtKind::IfThen { .. } => "IfThen".to_string(),
            StmtKind::IfElse { .. } => "IfElse".to_string(),
            StmtKind::ResetTimer => "ResetTimer".to_string(),
            StmtKind::SetYawAngle => "SetYawAngle".to_string(),
            StmtKind::Placeholder { block, .. } => format!("Placeholder({})", block),
        }
    }
}

// Long stacks would otherwise drop recursively through `next`.
impl Drop for Stmt {
    fn drop(&mut self) {
        let mut next = self.next.take();
        while let Some(mut stmt) = next {
            next = stmt.next.take();
        }
    }
}

pub struct ChainIter<'a> {
    current: Option<&'a Stmt>,
}

impl<'a> Iterator for ChainIter<'a> {
    type Item = &'a Stmt;

    fn next(&mut self) -> Option<Self::Item> {
        let stmt = self.current?;
        self.current = stmt.next.as_deref();
        Some(stmt)
    }
}

/// An ordered forest of hat-rooted stacks.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Forest {
    pub roots: Vec<Stmt>,
}

impl Forest {
    pub fn new(roots: Vec<Stmt>) -> Self {
        Self { roots }
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }
}
