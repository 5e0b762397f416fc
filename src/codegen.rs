use crate::error::{CompileError, CompileResult};
use crate::ir::{
    AngleUnit, ArithOp, Body, ButtonAction, ButtonType, CenterButtonColor, Comparator,
    DistanceUnit, Expr, Forest, GoDirection, HubInteraction, HubOrientation, MathFunc, MotorUnit,
    MoveDirection, MoveUnit, NodeRef, SensorColor, Stmt, StmtKind, TurnDirection,
    UnsupportedFeature,
};
use std::collections::HashSet;
use std::fmt::{self, Display, Formatter};

const PREAMBLE: &str = "from mindstorms import MSHub, Motor, MotorPair, ColorSensor, DistanceSensor, App
from mindstorms.control import wait_for_seconds, wait_until, Timer
from mindstorms.operator import greater_than, greater_than_or_equal_to, less_than, less_than_or_equal_to, equal_to, not_equal_to
import math
";
const RANDOM_IMPORT: &str = "from random import randint\n";

const OBJECTS_HEADER: &str = "# Create your objects here.";
const FUNCTIONS_HEADER: &str = "# Declare you functions here.";
const PROGRAM_HEADER: &str = "# Write your program here.";

const DEFAULT_MOVEMENT_PORTS: (char, char) = ('A', 'B');
const DEFAULT_MOVEMENT_SPEED: i64 = 50;
const DEFAULT_BRIGHTNESS: i64 = 100;

const SERIAL_MOTORS_NOTE: [&str; 2] = [
    "# Note: the word blocks run these motors at the same time,",
    "# here they run one after the other.",
];
const WHOLE_DEGREES_NOTE: &str =
    "# Note: motor positions are whole degrees, so the value is converted with int().";
const ONE_BASED_INDEX_NOTE: &str =
    "# Note: word-block positions start at 1, Python positions start at 0.";
const MOVEMENT_PAIR_NOTE: &str =
    "# Note: this fails if the list does not hold at least two ports.";
const REPEAT_COUNT_NOTE: &str =
    "# Note: repeat counts are whole numbers, so the value is converted with int().";
const LOOSE_STACK_NOTE: &str =
    "# Note: a stack without a when program starts block never runs, so it is left out.";

const TURN_ON_PATTERN: &str = "_turn_on_pattern";
const BRIGHTNESS_VAR: &str = "_brightness";

/// Generated Python, kept in sections until rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PythonProgram {
    pub preamble: String,
    pub declarations: Vec<String>,
    pub functions: Vec<String>,
    pub body: Vec<String>,
}

impl Display for PythonProgram {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.preamble)?;
        writeln!(f, "{}", OBJECTS_HEADER)?;
        for line in &self.declarations {
            writeln!(f, "{}", line)?;
        }
        if !self.functions.is_empty() {
            writeln!(f, "{}", FUNCTIONS_HEADER)?;
            for line in &self.functions {
                writeln!(f, "{}", line)?;
            }
        }
        writeln!(f, "{}", PROGRAM_HEADER)?;
        for line in &self.body {
            writeln!(f, "{}", line)?;
        }
        Ok(())
    }
}

/// Translates a whole forest into Python source text.
pub fn generate(forest: &Forest) -> CompileResult<String> {
    generate_program(forest).map(|program| program.to_string())
}

pub fn generate_program(forest: &Forest) -> CompileResult<PythonProgram> {
    Generator::new(forest).run(forest)
}

#[derive(Debug, Clone, Copy)]
enum Device {
    Motor,
    ColorSensor,
    DistanceSensor,
}

impl Device {
    fn class(self) -> &'static str {
        match self {
            Device::Motor => "Motor",
            Device::ColorSensor => "ColorSensor",
            Device::DistanceSensor => "DistanceSensor",
        }
    }

    fn prefix(self) -> &'static str {
        match self {
            Device::Motor => "motor",
            Device::ColorSensor => "color_sensor",
            Device::DistanceSensor => "distance_sensor",
        }
    }
}

/// Where a multi-port statement sends its per-port call.
enum Targets {
    Objects(Vec<String>),
    Loop { iterable: String, object: String },
}

impl Targets {
    fn is_plural(&self) -> bool {
        match self {
            Targets::Objects(objects) => objects.len() > 1,
            Targets::Loop { .. } => true,
        }
    }
}

/// Declared names, kept apart by kind so a user list never hides a generated object.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Symbol {
    Object(String),
    List(String),
    Function(&'static str),
    Import(&'static str),
}

struct Generator {
    preamble: String,
    declarations: Vec<String>,
    functions: Vec<String>,
    body: Vec<String>,
    declared: HashSet<Symbol>,
    indent: usize,
    uses_brightness: bool,
}

impl Generator {
    fn new(forest: &Forest) -> Self {
        let uses_brightness = forest.roots.iter().any(|root| {
            contains_stmt(root, &|kind| {
                matches!(kind, StmtKind::SetPixelBrightness { .. })
            })
        });
        Self {
            preamble: PREAMBLE.to_string(),
            declarations: Vec::new(),
            functions: Vec::new(),
            body: Vec::new(),
            declared: HashSet::new(),
            indent: 0,
            uses_brightness,
        }
    }

    fn run(mut self, forest: &Forest) -> CompileResult<PythonProgram> {
        let mut hats = 0;
        for root in &forest.roots {
            if !root.is_hat() {
                log::warn!("leaving out a stack without a hat block, starting at {}", root.label());
                self.line(LOOSE_STACK_NOTE);
                continue;
            }
            if hats > 0 {
                self.placeholder("when program starts", Some(UnsupportedFeature::ParallelStacks));
            }
            hats += 1;
            if let Some(head) = root.next.as_deref() {
                self.chain(head)?;
            }
        }
        log::debug!(
            "generated {} declarations, {} body lines",
            self.declarations.len(),
            self.body.len()
        );
        Ok(PythonProgram {
            preamble: self.preamble,
            declarations: self.declarations,
            functions: self.functions,
            body: self.body,
        })
    }

    fn chain(&mut self, head: &Stmt) -> CompileResult<()> {
        for stmt in head.iter() {
            self.stmt(stmt)?;
        }
        Ok(())
    }

    fn block_body(&mut self, body: &Body) -> CompileResult<()> {
        self.indent += 1;
        let result = match body.as_deref() {
            Some(head) => self.chain(head),
            None => {
                self.line("pass");
                Ok(())
            }
        };
        self.indent -= 1;
        result
    }

    fn line(&mut self, text: &str) {
        let mut line = "\t".repeat(self.indent);
        line.push_str(text);
        self.body.push(line);
    }

    fn lines(&mut self, texts: &[&str]) {
        for text in texts {
            self.line(text);
        }
    }

    fn declare(&mut self, symbol: Symbol, lines: &[String]) {
        if self.declared.insert(symbol) {
            self.declarations.extend(lines.iter().cloned());
        }
    }

    fn object(&mut self, name: &'static str, constructor: &str) -> &'static str {
        self.declare(
            Symbol::Object(name.to_string()),
            &[format!("{} = {}", name, constructor)],
        );
        name
    }

    fn hub(&mut self) -> &'static str {
        self.object("hub", "MSHub()")
    }

    fn app(&mut self) -> &'static str {
        self.object("app", "App()")
    }

    fn timer(&mut self) -> &'static str {
        self.object("timer", "Timer()")
    }

    fn motor_pair(&mut self) -> &'static str {
        let (left, right) = DEFAULT_MOVEMENT_PORTS;
        self.declare(
            Symbol::Object("motor_pair".to_string()),
            &[
                format!("motor_pair = MotorPair('{}','{}')", left, right),
                format!(
                    "motor_pair.set_default_speed({})  # Note: word-block movement starts at {}% speed.",
                    DEFAULT_MOVEMENT_SPEED, DEFAULT_MOVEMENT_SPEED
                ),
            ],
        );
        "motor_pair"
    }

    fn device(&mut self, device: Device, port: char) -> String {
        let name = format!("{}_{}", device.prefix(), port.to_ascii_lowercase());
        let decl = format!("{} = {}('{}')", name, device.class(), port);
        self.declare(Symbol::Object(name.clone()), &[decl]);
        name
    }

    fn require_random(&mut self) {
        if self.declared.insert(Symbol::Import("randint")) {
            self.preamble.push_str(RANDOM_IMPORT);
        }
    }

    fn turn_on_pattern_helper(&mut self) {
        let hub = self.hub();
        if self.declared.insert(Symbol::Function(TURN_ON_PATTERN)) {
            self.functions.extend([
                format!("def {}(pattern, brightness={}):", TURN_ON_PATTERN, DEFAULT_BRIGHTNESS),
                "\tfor i in range(25):".to_string(),
                format!(
                    "\t\t{}.light_matrix.set_pixel(i%5, int(i/5), int(brightness*int(pattern[i])/9.0))",
                    hub
                ),
            ]);
        }
        if self.uses_brightness {
            self.declare(
                Symbol::Object(BRIGHTNESS_VAR.to_string()),
                &[format!("{} = {}", BRIGHTNESS_VAR, DEFAULT_BRIGHTNESS)],
            );
        }
    }

    fn pattern_call(&mut self, pattern: &Expr) -> CompileResult<String> {
        self.turn_on_pattern_helper();
        let pattern = self.expr(pattern)?;
        Ok(if self.uses_brightness {
            format!("{}({}, {})", TURN_ON_PATTERN, pattern, BRIGHTNESS_VAR)
        } else {
            format!("{}({})", TURN_ON_PATTERN, pattern)
        })
    }

    fn placeholder(&mut self, block: &str, feature: Option<UnsupportedFeature>) {
        let what = feature.map(UnsupportedFeature::description).unwrap_or(block);
        self.line(&format!(
            "# Placeholder for the {} block. Note: that {} is not supported in Python at the moment.",
            block, what
        ));
    }

    fn targets(&mut self, ports: &Expr, device: Device) -> CompileResult<Targets> {
        match ports {
            Expr::PortList(letters) if !letters.is_empty() => Ok(Targets::Objects(
                letters.iter().map(|port| self.device(device, *port)).collect(),
            )),
            Expr::PortList(_) => Err(CompileError::invariant("empty port list.")),
            Expr::Variable(var) => Ok(Targets::Loop {
                iterable: identifier(&var.name),
                object: format!("{}(port)", device.class()),
            }),
            other => Err(CompileError::UnsupportedPortExpression {
                shape: other.label(),
            }),
        }
    }

    fn emit_targets<F>(&mut self, targets: &Targets, render: F)
    where
        F: Fn(&str) -> String,
    {
        match targets {
            Targets::Objects(objects) => {
                for object in objects {
                    self.line(&render(object));
                }
            }
            Targets::Loop { iterable, object } => {
                self.line(&format!("for port in {}:", iterable));
                self.indent += 1;
                self.line(&render(object));
                self.indent -= 1;
            }
        }
    }

    /// A single device in expression position: a one-port list or `var[0]`.
    fn single_device(&mut self, port: &Expr, device: Device) -> CompileResult<String> {
        match port {
            Expr::PortList(letters) if letters.len() == 1 => Ok(self.device(device, letters[0])),
            Expr::Variable(var) => Ok(format!("{}({}[0])", device.class(), identifier(&var.name))),
            other => Err(CompileError::UnsupportedPortExpression {
                shape: other.label(),
            }),
        }
    }

    fn stmt(&mut self, stmt: &Stmt) -> CompileResult<()> {
        match &stmt.kind {
            StmtKind::WhenProgramStarts { .. } => {
                return Err(CompileError::invariant(
                    "hat block found inside a stack.",
                ))
            }

            StmtKind::SetVariable { var, value } => {
                let value = self.expr(value)?;
                self.line(&format!("{} = {}", identifier(&var.name), value));
            }
            StmtKind::ChangeVariable { var, value } => {
                let value = self.expr(value)?;
                self.line(&format!("{} += {}", identifier(&var.name), value));
            }
            StmtKind::AddItemToList { list, item } => {
                let name = identifier(&list.name);
                self.declare(Symbol::List(name.clone()), &[format!("{} = []", name)]);
                let item = self.expr(item)?;
                self.line(&format!("{}.append({})", name, item));
            }
            StmtKind::DeleteItem { list, index } => {
                let index = self.expr(index)?;
                self.line(ONE_BASED_INDEX_NOTE);
                self.line(&format!("del {}[int({})-1]", identifier(&list.name), index));
            }
            StmtKind::DeleteAllItems { list } => {
                self.line(&format!("{}.clear()", identifier(&list.name)));
            }
            StmtKind::InsertAt { list, item, index } => {
                let item = self.expr(item)?;
                let index = self.expr(index)?;
                self.line(ONE_BASED_INDEX_NOTE);
                self.line(&format!(
                    "{}.insert(int({})-1, {})",
                    identifier(&list.name),
                    index,
                    item
                ));
            }
            StmtKind::ReplaceAt { list, index, item } => {
                let index = self.expr(index)?;
                let item = self.expr(item)?;
                self.line(ONE_BASED_INDEX_NOTE);
                self.line(&format!(
                    "{}[int({})-1] = {}",
                    identifier(&list.name),
                    index,
                    item
                ));
            }

            StmtKind::RunMotorForDuration {
                ports,
                direction,
                value,
                unit,
            } => {
                let targets = self.targets(ports, Device::Motor)?;
                let value = self.expr(value)?;
                let ccw = *direction == TurnDirection::CounterClockwise;
                if targets.is_plural() {
                    self.lines(&SERIAL_MOTORS_NOTE);
                }
                match unit {
                    MotorUnit::Rotations => {
                        let value = if ccw { negate(&value) } else { value };
                        self.emit_targets(&targets, |m| format!("{}.run_for_rotations({})", m, value));
                    }
                    MotorUnit::Degrees => {
                        let value = if ccw { negate(&value) } else { value };
                        self.line(WHOLE_DEGREES_NOTE);
                        self.emit_targets(&targets, |m| {
                            format!("{}.run_for_degrees(int({}))", m, value)
                        });
                    }
                    MotorUnit::Seconds => {
                        let value = if ccw { negate(&value) } else { value };
                        self.emit_targets(&targets, |m| format!("{}.run_for_seconds({})", m, value));
                    }
                }
            }
            StmtKind::MotorGoToPosition {
                ports,
                direction,
                position,
            } => {
                let targets = self.targets(ports, Device::Motor)?;
                let position = self.expr(position)?;
                if targets.is_plural() {
                    self.lines(&SERIAL_MOTORS_NOTE);
                }
                self.line(WHOLE_DEGREES_NOTE);
                let code = go_direction(*direction);
                self.emit_targets(&targets, |m| {
                    format!("{}.run_to_position(int({}), '{}')", m, position, code)
                });
            }
            StmtKind::StartMotor { ports, direction } => {
                let targets = self.targets(ports, Device::Motor)?;
                match direction {
                    TurnDirection::Clockwise => {
                        self.emit_targets(&targets, |m| format!("{}.start()", m))
                    }
                    TurnDirection::CounterClockwise => self.emit_targets(&targets, |m| {
                        format!("{}.start(-{}.get_default_speed())", m, m)
                    }),
                }
            }
            StmtKind::StopMotor { ports } => {
                let targets = self.targets(ports, Device::Motor)?;
                self.emit_targets(&targets, |m| format!("{}.stop()", m));
            }
            StmtKind::SetMotorSpeed { ports, speed } => {
                let targets = self.targets(ports, Device::Motor)?;
                let speed = self.expr(speed)?;
                self.emit_targets(&targets, |m| format!("{}.set_default_speed(int({}))", m, speed));
            }

            StmtKind::Move {
                direction,
                value,
                unit,
            } => {
                let pair = self.motor_pair();
                let value = self.expr(value)?;
                let unit = move_unit(*unit);
                let call = match direction {
                    MoveDirection::Forward => format!("{}.move({}, '{}')", pair, value, unit),
                    MoveDirection::Back => {
                        format!("{}.move({}, '{}')", pair, negate(&value), unit)
                    }
                    MoveDirection::Clockwise => {
                        format!("{}.move({}, '{}', steering=100)", pair, value, unit)
                    }
                    MoveDirection::CounterClockwise => {
                        format!("{}.move({}, '{}', steering=-100)", pair, value, unit)
                    }
                };
                self.line(&call);
            }
            StmtKind::MoveWithSteering {
                steering,
                value,
                unit,
            } => {
                let pair = self.motor_pair();
                let steering = self.expr(steering)?;
                let value = self.expr(value)?;
                self.line(&format!(
                    "{}.move({}, '{}', steering=int({}))",
                    pair,
                    value,
                    move_unit(*unit),
                    steering
                ));
            }
            StmtKind::StartMoving { direction } => {
                let pair = self.motor_pair();
                let call = match direction {
                    MoveDirection::Forward => format!("{}.start()", pair),
                    MoveDirection::Back => {
                        format!("{}.start(speed=-{}.get_default_speed())", pair, pair)
                    }
                    MoveDirection::Clockwise => format!("{}.start(steering=100)", pair),
                    MoveDirection::CounterClockwise => format!("{}.start(steering=-100)", pair),
                };
                self.line(&call);
            }
            StmtKind::StartSteering { steering } => {
                let pair = self.motor_pair();
                let steering = self.expr(steering)?;
                self.line(&format!("{}.start(steering=int({}))", pair, steering));
            }
            StmtKind::StopMoving => {
                let pair = self.motor_pair();
                self.line(&format!("{}.stop()", pair));
            }
            StmtKind::SetMovementSpeed { speed } => {
                let pair = self.motor_pair();
                let speed = self.expr(speed)?;
                self.line(&format!("{}.set_default_speed(int({}))", pair, speed));
            }
            StmtKind::SetMovementMotors { ports } => {
                let pair = self.motor_pair();
                match ports {
                    Expr::PortList(letters) if letters.len() == 2 => {
                        self.line(&format!(
                            "{} = MotorPair('{}','{}')",
                            pair, letters[0], letters[1]
                        ));
                    }
                    Expr::Variable(var) => {
                        let name = identifier(&var.name);
                        self.line(MOVEMENT_PAIR_NOTE);
                        self.line(&format!(
                            "{} = MotorPair({}[0], {}[1])",
                            pair, name, name
                        ));
                    }
                    other => {
                        return Err(CompileError::UnsupportedPortExpression {
                            shape: format!("movement pair {}", other.label()),
                        })
                    }
                }
            }
            StmtKind::SetMotorRotation { distance, unit } => {
                let pair = self.motor_pair();
                let distance = self.expr(distance)?;
                let unit = match unit {
                    DistanceUnit::Cm => "cm",
                    DistanceUnit::Inches => "in",
                    DistanceUnit::Percent => {
                        return Err(CompileError::invariant(
                            "motor rotation cannot be set in percent.",
                        ))
                    }
                };
                self.line(&format!("{}.set_motor_rotation({}, '{}')", pair, distance, unit));
            }

            StmtKind::TurnOnFor { pattern, duration } => {
                let call = self.pattern_call(pattern)?;
                let duration = self.expr(duration)?;
                let hub = self.hub();
                self.line(&call);
                self.line(&format!("wait_for_seconds(int({}))", duration));
                self.line(&format!("{}.light_matrix.off()", hub));
            }
            StmtKind::TurnOn { pattern } => {
                let call = self.pattern_call(pattern)?;
                self.line(&call);
            }
            StmtKind::Write { text } => {
                let hub = self.hub();
                let text = self.expr(text)?;
                self.line(&format!("{}.light_matrix.write({})", hub, text));
            }
            StmtKind::TurnOff => {
                let hub = self.hub();
                self.line(&format!("{}.light_matrix.off()", hub));
            }
            StmtKind::SetPixelBrightness { brightness } => {
                self.turn_on_pattern_helper();
                let brightness = self.expr(brightness)?;
                self.line(&format!("{} = int({})", BRIGHTNESS_VAR, brightness));
            }
            StmtKind::SetPixel { x, y, brightness } => {
                let hub = self.hub();
                let x = self.expr(x)?;
                let y = self.expr(y)?;
                let brightness = self.expr(brightness)?;
                self.line(ONE_BASED_INDEX_NOTE);
                self.line(&format!(
                    "{}.light_matrix.set_pixel(int({})-1, int({})-1, int({}))",
                    hub, x, y, brightness
                ));
            }
            StmtKind::SetCenterButton { color } => {
                let hub = self.hub();
                let color = match literal_index(color) {
                    Some(index) => {
                        let color = CenterButtonColor::from_index(index)?;
                        format!("'{}'", center_button_name(color))
                    }
                    None => format!("{}[int({})]", center_button_table(), self.expr(color)?),
                };
                self.line(&format!("{}.status_light.on({})", hub, color));
            }
            StmtKind::LightUpDistanceSensor { port, pattern } => {
                let targets = self.targets(port, Device::DistanceSensor)?;
                let args = match digit_pattern(pattern) {
                    Some(digits) => digits
                        .chars()
                        .filter_map(|c| c.to_digit(10))
                        .map(|d| (d * 100 / 9).to_string())
                        .collect::<Vec<_>>()
                        .join(", "),
                    None => format!(
                        "*[int(int(c)*100/9) for c in str({})]",
                        self.expr(pattern)?
                    ),
                };
                self.emit_targets(&targets, |s| format!("{}.light_up({})", s, args));
            }

            StmtKind::PlaySoundUntilDone { sound } => {
                let app = self.app();
                let hub = self.hub();
                self.line(&format!("{}.play_sound({})", app, py_string(sound)));
                self.line(&format!("{}.light_matrix.write('Y')", hub));
            }
            StmtKind::StartSound { sound } => {
                let app = self.app();
                let hub = self.hub();
                self.line(&format!("{}.start_sound({})", app, py_string(sound)));
                self.line(&format!("{}.light_matrix.write('Y')", hub));
            }
            StmtKind::PlayBeep { note, duration } => {
                let hub = self.hub();
                let note = self.expr(note)?;
                let duration = self.expr(duration)?;
                self.line(&format!("{}.speaker.beep(int({}), {})", hub, note, duration));
            }
            StmtKind::StartBeep { note } => {
                let hub = self.hub();
                let note = self.expr(note)?;
                self.line(&format!("{}.speaker.start_beep(int({}))", hub, note));
            }
            StmtKind::StopBeep => {
                let hub = self.hub();
                self.line(&format!("{}.speaker.stop()", hub));
            }
            StmtKind::SetVolume { volume } => {
                let hub = self.hub();
                let volume = self.expr(volume)?;
                self.line(&format!("{}.speaker.set_volume(int({}))", hub, volume));
            }
            StmtKind::ChangeVolume { volume } => {
                let hub = self.hub();
                let volume = self.expr(volume)?;
                self.line(&format!(
                    "{}.speaker.set_volume({}.speaker.get_volume() + int({}))",
                    hub, hub, volume
                ));
            }

            StmtKind::WaitForSeconds { duration } => {
                let duration = self.expr(duration)?;
                self.line(&format!("wait_for_seconds({})", duration));
            }
            StmtKind::WaitUntil { condition } => {
                let condition = self.expr(condition)?;
                self.line(&format!("wait_until(lambda: {})", condition));
            }
            StmtKind::RepeatLoop { times, body } => {
                let times = self.expr(times)?;
                self.line(REPEAT_COUNT_NOTE);
                self.line(&format!("for _ in range(int({})):", times));
                self.block_body(body)?;
            }
            StmtKind::ForeverLoop { body } => {
                self.line("while True:");
                self.block_body(body)?;
            }
            StmtKind::RepeatUntil { condition, body } => {
                let condition = self.expr(condition)?;
                self.line(&format!("while not ({}):", condition));
                self.block_body(body)?;
            }
            StmtKind::IfThen { condition, body } => {
                let condition = self.expr(condition)?;
                self.line(&format!("if ({}):", condition));
                self.block_body(body)?;
            }
            StmtKind::IfElse {
                condition,
                body,
                else_body,
            } => {
                let condition = self.expr(condition)?;
                self.line(&format!("if ({}):", condition));
                self.block_body(body)?;
                self.line("else:");
                self.block_body(else_body)?;
            }

            StmtKind::ResetTimer => {
                let timer = self.timer();
                self.line(&format!("{}.reset()", timer));
            }
            StmtKind::SetYawAngle => {
                let hub = self.hub();
                self.line(&format!("{}.motion_sensor.reset_yaw_angle()", hub));
            }
            StmtKind::Placeholder { block, feature } => self.placeholder(block, *feature),
        }
        Ok(())
    }

    /// Lowers an expression to Python text. May add declarations, and comment lines
    /// ahead of the statement that uses it, never statement lines.
    fn expr(&mut self, expr: &Expr) -> CompileResult<String> {
        let text = match expr {
            Expr::Number(value) => py_number(*value),
            Expr::Text(value) => py_string(value),
            Expr::PortList(ports) => format!(
                "[{}]",
                ports
                    .iter()
                    .map(|p| format!("'{}'", p))
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            Expr::Variable(var) => identifier(&var.name),
            Expr::Arithmetic { op, lhs, rhs } => {
                let lhs = self.expr(lhs)?;
                let rhs = self.expr(rhs)?;
                format!("({} {} {})", lhs, arith_op(*op), rhs)
            }
            Expr::Comparison { op, lhs, rhs } => {
                let lhs = self.expr(lhs)?;
                let rhs = self.expr(rhs)?;
                format!("{} {} {}", lhs, comparator(*op), rhs)
            }
            Expr::And(lhs, rhs) => {
                let lhs = self.expr(lhs)?;
                let rhs = self.expr(rhs)?;
                format!("({} and {})", lhs, rhs)
            }
            Expr::Or(lhs, rhs) => {
                let lhs = self.expr(lhs)?;
                let rhs = self.expr(rhs)?;
                format!("({} or {})", lhs, rhs)
            }
            Expr::Not(operand) => format!("not ({})", self.expr(operand)?),
            Expr::Between { value, low, high } => {
                let value = self.expr(value)?;
                let low = self.expr(low)?;
                let high = self.expr(high)?;
                format!("({} <= {} <= {})", low, value, high)
            }
            Expr::Join(lhs, rhs) => {
                let lhs = self.expr(lhs)?;
                let rhs = self.expr(rhs)?;
                format!("(str({}) + str({}))", lhs, rhs)
            }
            Expr::LetterOf { index, text } => {
                let index = self.expr(index)?;
                let text = self.expr(text)?;
                format!("str({})[int({})-1]", text, index)
            }
            Expr::Length(text) => format!("len(str({}))", self.expr(text)?),
            Expr::Contains { text, needle } => {
                let text = self.expr(text)?;
                let needle = self.expr(needle)?;
                format!("(str({}).lower() in str({}).lower())", needle, text)
            }
            Expr::Modulo(lhs, rhs) => {
                let lhs = self.expr(lhs)?;
                let rhs = self.expr(rhs)?;
                format!("({} % {})", lhs, rhs)
            }
            Expr::Round(value) => format!("int({} + 0.5)", self.expr(value)?),
            Expr::MathFunction { func, arg, arg2 } => {
                let arg = self.expr(arg)?;
                let arg2 = match arg2 {
                    Some(arg2) => Some(self.expr(arg2)?),
                    None => None,
                };
                math_call(*func, &arg, arg2.as_deref())?
            }
            Expr::Random { low, high } => {
                self.require_random();
                let low = self.expr(low)?;
                let high = self.expr(high)?;
                format!("randint(int({}), int({}))", low, high)
            }

            Expr::MotorPosition { port } => {
                format!("{}.get_position()", self.single_device(port, Device::Motor)?)
            }
            Expr::MotorSpeed { port } => {
                format!("{}.get_speed()", self.single_device(port, Device::Motor)?)
            }
            Expr::Color { port } => {
                let sensor = self.single_device(port, Device::ColorSensor)?;
                format!("{}[{}.get_color()]", sensor_color_index_table(), sensor)
            }
            Expr::IsColor { port, color } => {
                let sensor = self.single_device(port, Device::ColorSensor)?;
                match literal_index(color) {
                    Some(index) => match SensorColor::from_index(index)? {
                        SensorColor::None => format!("{}.get_color() is None", sensor),
                        color => format!("{}.get_color() == '{}'", sensor, sensor_color_name(color)),
                    },
                    None => format!(
                        "{}.get_color() == {}[int({})]",
                        sensor,
                        sensor_color_name_table(),
                        self.expr(color)?
                    ),
                }
            }
            Expr::ReflectedLight { port } => {
                let sensor = self.single_device(port, Device::ColorSensor)?;
                format!("{}.get_reflected_light()", sensor)
            }
            Expr::IsReflectedLight {
                port,
                comparator: op,
                value,
            } => {
                let sensor = self.single_device(port, Device::ColorSensor)?;
                let value = self.expr(value)?;
                format!("{}.get_reflected_light() {} {}", sensor, comparator(*op), value)
            }
            Expr::Distance { port, unit } => {
                let sensor = self.single_device(port, Device::DistanceSensor)?;
                format!("{}.{}()", sensor, distance_method(*unit))
            }
            Expr::IsDistance {
                port,
                comparator: op,
                value,
                unit,
            } => {
                let sensor = self.single_device(port, Device::DistanceSensor)?;
                let value = self.expr(value)?;
                format!(
                    "{}.{}() {} {}",
                    sensor,
                    distance_method(*unit),
                    comparator(*op),
                    value
                )
            }
            Expr::Gesture => {
                let hub = self.hub();
                format!("{}[{}.motion_sensor.get_gesture()]", gesture_index_table(), hub)
            }
            Expr::IsGesture(gesture) => {
                let hub = self.hub();
                format!(
                    "{}.motion_sensor.get_gesture() == '{}'",
                    hub,
                    gesture_name(*gesture)
                )
            }
            Expr::Orientation => {
                let hub = self.hub();
                format!(
                    "{}[{}.motion_sensor.get_orientation()]",
                    orientation_index_table(),
                    hub
                )
            }
            Expr::IsOrientation(orientation) => {
                let hub = self.hub();
                format!(
                    "{}.motion_sensor.get_orientation() == '{}'",
                    hub,
                    orientation.tag()
                )
            }
            Expr::HubAngle(axis) => {
                let hub = self.hub();
                let method = match axis {
                    AngleUnit::Pitch => "get_pitch_angle",
                    AngleUnit::Roll => "get_roll_angle",
                    AngleUnit::Yaw => "get_yaw_angle",
                };
                format!("{}.motion_sensor.{}()", hub, method)
            }
            Expr::IsButton { button, action } => {
                let hub = self.hub();
                let side = match button {
                    ButtonType::Left => "left_button",
                    ButtonType::Right => "right_button",
                };
                let method = match action {
                    ButtonAction::Pressed => "is_pressed",
                    ButtonAction::Released => "is_released",
                };
                format!("{}.{}.{}()", hub, side, method)
            }
            Expr::TimerValue => format!("{}.now()", self.timer()),
            Expr::Volume => format!("{}.speaker.get_volume()", self.hub()),
            // The hub has no keyboard; key presses never register.
            Expr::KeyPressed { .. } => {
                self.placeholder("key pressed", None);
                "False".to_string()
            }

            Expr::ItemOfList { list, index } => {
                format!("{}[int({})-1]", identifier(&list.name), self.expr(index)?)
            }
            Expr::IndexOfItem { list, item } => {
                format!("({}.index({})+1)", identifier(&list.name), self.expr(item)?)
            }
            Expr::LengthOfList { list } => format!("len({})", identifier(&list.name)),
            Expr::ListContains { list, item } => {
                format!("({} in {})", self.expr(item)?, identifier(&list.name))
            }
        };
        Ok(text)
    }
}

fn contains_stmt(root: &Stmt, pred: &dyn Fn(&StmtKind) -> bool) -> bool {
    root.iter().any(|stmt| {
        pred(&stmt.kind)
            || stmt.children().into_iter().any(|child| match child {
                NodeRef::Stmt(head) => contains_stmt(head, pred),
                NodeRef::Expr(_) => false,
            })
    })
}

fn arith_op(op: ArithOp) -> &'static str {
    op.tag()
}

fn comparator(op: Comparator) -> &'static str {
    match op {
        Comparator::Less => "<",
        Comparator::Equal => "==",
        Comparator::Greater => ">",
    }
}

fn go_direction(direction: GoDirection) -> &'static str {
    match direction {
        GoDirection::Shortest => "shortest path",
        GoDirection::Clockwise => "clockwise",
        GoDirection::CounterClockwise => "counterclockwise",
    }
}

fn move_unit(unit: MoveUnit) -> &'static str {
    match unit {
        MoveUnit::Cm => "cm",
        MoveUnit::Inches => "in",
        MoveUnit::Rotations => "rotations",
        MoveUnit::Degrees => "degrees",
        MoveUnit::Seconds => "seconds",
    }
}

fn distance_method(unit: DistanceUnit) -> &'static str {
    match unit {
        DistanceUnit::Cm => "get_distance_cm",
        DistanceUnit::Inches => "get_distance_inches",
        DistanceUnit::Percent => "get_distance_percentage",
    }
}

fn math_call(func: MathFunc, arg: &str, arg2: Option<&str>) -> CompileResult<String> {
    let binary = |name: &str| -> CompileResult<String> {
        let arg2 = arg2.ok_or_else(|| {
            CompileError::invariant(format!("{} needs two arguments.", func.tag()))
        })?;
        Ok(format!("{}({}, {})", name, arg, arg2))
    };
    Ok(match func {
        MathFunc::Abs => format!("abs({})", arg),
        MathFunc::Floor => format!("math.floor({})", arg),
        MathFunc::Ceiling => format!("math.ceil({})", arg),
        MathFunc::Sqrt => format!("math.sqrt({})", arg),
        MathFunc::Sin => format!("math.sin({})", arg),
        MathFunc::Cos => format!("math.cos({})", arg),
        MathFunc::Tan => format!("math.tan({})", arg),
        MathFunc::Asin => format!("math.asin({})", arg),
        MathFunc::Acos => format!("math.acos({})", arg),
        MathFunc::Atan => format!("math.atan({})", arg),
        MathFunc::Ln => format!("math.log({})", arg),
        MathFunc::Log => format!("math.log2({})", arg),
        MathFunc::Exp => format!("pow(math.e, {})", arg),
        MathFunc::Pow10 => format!("pow(10, {})", arg),
        MathFunc::Atan2 => binary("math.atan2")?,
        MathFunc::Pow => binary("pow")?,
        MathFunc::Min => binary("min")?,
        MathFunc::Max => binary("max")?,
        MathFunc::CopySign => binary("math.copysign")?,
        MathFunc::Hypot => binary("math.hypot")?,
    })
}

fn sensor_color_name(color: SensorColor) -> &'static str {
    match color {
        SensorColor::None => "None",
        SensorColor::Black => "black",
        SensorColor::Violet => "violet",
        SensorColor::Blue => "blue",
        SensorColor::Azure => "cyan",
        SensorColor::Green => "green",
        SensorColor::Yellow => "yellow",
        SensorColor::Red => "red",
        SensorColor::White => "white",
    }
}

fn center_button_name(color: CenterButtonColor) -> &'static str {
    match color {
        CenterButtonColor::Black => "black",
        CenterButtonColor::Violet => "violet",
        CenterButtonColor::Blue => "blue",
        CenterButtonColor::Azure => "azure",
        CenterButtonColor::Green => "green",
        CenterButtonColor::Yellow => "yellow",
        CenterButtonColor::Red => "red",
        CenterButtonColor::White => "white",
    }
}

fn gesture_name(gesture: HubInteraction) -> &'static str {
    match gesture {
        HubInteraction::Shaken => "shaken",
        HubInteraction::Tapped => "tapped",
        HubInteraction::Falling => "falling",
    }
}

/// `{None: -1, 'black': 0, ...}`: sensor reading to palette index.
fn sensor_color_index_table() -> String {
    let entries = SensorColor::ALL
        .iter()
        .map(|c| match c {
            SensorColor::None => format!("None: {}", c.index()),
            _ => format!("'{}': {}", sensor_color_name(*c), c.index()),
        })
        .collect::<Vec<_>>();
    format!("{{{}}}", entries.join(", "))
}

/// `{-1: None, 0: 'black', ...}`: palette index to sensor reading.
fn sensor_color_name_table() -> String {
    let entries = SensorColor::ALL
        .iter()
        .map(|c| match c {
            SensorColor::None => format!("{}: None", c.index()),
            _ => format!("{}: '{}'", c.index(), sensor_color_name(*c)),
        })
        .collect::<Vec<_>>();
    format!("{{{}}}", entries.join(", "))
}

fn center_button_table() -> String {
    let entries = CenterButtonColor::ALL
        .iter()
        .map(|c| format!("{}: '{}'", c.index(), center_button_name(*c)))
        .collect::<Vec<_>>();
    format!("{{{}}}", entries.join(", "))
}

fn gesture_index_table() -> String {
    let entries = std::iter::once("None: -1".to_string())
        .chain(
            HubInteraction::ALL
                .iter()
                .enumerate()
                .map(|(i, g)| format!("'{}': {}", gesture_name(*g), i)),
        )
        .collect::<Vec<_>>();
    format!("{{{}}}", entries.join(", "))
}

fn orientation_index_table() -> String {
    let entries = HubOrientation::ALL
        .iter()
        .enumerate()
        .map(|(i, o)| format!("'{}': {}", o.tag(), i))
        .collect::<Vec<_>>();
    format!("{{{}}}", entries.join(", "))
}

/// A palette index written directly in the program, if any.
fn literal_index(expr: &Expr) -> Option<i64> {
    match expr {
        Expr::Number(value) if value.fract() == 0.0 => Some(*value as i64),
        Expr::Text(text) => text.trim().parse::<i64>().ok(),
        _ => None,
    }
}

/// Digits of a literal brightness pattern such as "9999".
fn digit_pattern(expr: &Expr) -> Option<String> {
    let digits = match expr {
        Expr::Text(text) => text.trim().to_string(),
        Expr::Number(value) if value.fract() == 0.0 && *value >= 0.0 => format!("{}", *value as u64),
        _ => return None,
    };
    if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) {
        Some(digits)
    } else {
        None
    }
}

/// Prints a number the way Python's `repr(float)` does: positional between
/// 1e-4 and 1e16, scientific with a signed two-digit exponent outside it.
pub fn py_number(value: f64) -> String {
    if value.is_nan() {
        "float('nan')".to_string()
    } else if value.is_infinite() {
        if value > 0.0 {
            "float('inf')".to_string()
        } else {
            "float('-inf')".to_string()
        }
    } else {
        let scientific = format!("{:e}", value);
        let (mantissa, exponent) = scientific.split_once('e').unwrap_or((scientific.as_str(), "0"));
        let exponent = exponent.parse::<i32>().unwrap_or(0);
        if value != 0.0 && !(-4..16).contains(&exponent) {
            let sign = if exponent < 0 { '-' } else { '+' };
            format!("{}e{}{:02}", mantissa, sign, exponent.abs())
        } else if value.fract() == 0.0 {
            format!("{:.1}", value)
        } else {
            format!("{}", value)
        }
    }
}

pub fn py_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('\'');
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            _ => out.push(c),
        }
    }
    out.push('\'');
    out
}

fn negate(value: &str) -> String {
    if value.starts_with('-') {
        format!("-({})", value)
    } else {
        format!("-{}", value)
    }
}

const PYTHON_KEYWORDS: &[&str] = &[
    "False", "None", "True", "and", "as", "assert", "async", "await", "break", "class",
    "continue", "def", "del", "elif", "else", "except", "finally", "for", "from", "global", "if",
    "import", "in", "is", "lambda", "nonlocal", "not", "or", "pass", "raise", "return", "try",
    "while", "with", "yield",
];

/// Names the generated program defines or imports itself.
const GENERATED_NAMES: &[&str] = &[
    "hub", "app", "timer", "motor_pair", "port", "_", "math", "randint", BRIGHTNESS_VAR,
    TURN_ON_PATTERN, "MSHub", "Motor", "MotorPair", "ColorSensor", "DistanceSensor", "App",
    "Timer", "wait_for_seconds", "wait_until", "greater_than", "greater_than_or_equal_to",
    "less_than", "less_than_or_equal_to", "equal_to", "not_equal_to", "abs", "float", "int",
    "len", "max", "min", "pow", "range", "str",
];

fn is_generated_name(ident: &str) -> bool {
    if GENERATED_NAMES.contains(&ident) {
        return true;
    }
    [Device::Motor, Device::ColorSensor, Device::DistanceSensor]
        .iter()
        .filter_map(|device| ident.strip_prefix(device.prefix())?.strip_prefix('_'))
        .any(|port| matches!(port, "a" | "b" | "c" | "d" | "e" | "f"))
}

/// Turns a word-block variable name into a Python identifier that cannot
/// clash with a keyword or a name the generated program uses.
pub fn identifier(name: &str) -> String {
    let mut ident = name
        .trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect::<String>();
    if ident.is_empty() || ident.starts_with(|c: char| c.is_ascii_digit()) {
        ident.insert(0, '_');
    }
    if PYTHON_KEYWORDS.contains(&ident.as_str()) || is_generated_name(&ident) {
        ident.push('_');
    }
    ident
}
