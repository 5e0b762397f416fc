use crate::error::{CompileError, CompileResult};
use crate::ir::{
    AngleUnit, ArithOp, Body, ButtonAction, ButtonType, Comparator, DistanceUnit, Expr, Forest,
    GoDirection, HubInteraction, HubOrientation, MathFunc, MotorUnit, MoveDirection, MoveUnit,
    Reference, Stmt, StmtKind, TurnDirection, UnsupportedFeature,
};
use crate::manifest::{
    block_coord, block_input, block_input_block_id, block_next, block_opcode, field_first_string,
    field_id, is_top_level, menu_value, FilteredManifest,
};
use regex::Regex;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::OnceLock;

/// Primitive codes used inside slot bindings.
const PRIMITIVE_BROADCAST: i64 = 11;
const PRIMITIVE_VARIABLE: i64 = 12;
const PRIMITIVE_LIST: i64 = 13;

#[derive(Debug, Clone, Copy, Default)]
pub struct ParseOptions {
    /// Substitute placeholders for unknown opcodes instead of failing.
    pub best_effort: bool,
}

pub struct Parser<'a> {
    manifest: &'a FilteredManifest,
    options: ParseOptions,
}

/// Convenience wrapper for `Parser::new(..).parse()`.
pub fn parse(manifest: &FilteredManifest, options: ParseOptions) -> CompileResult<Forest> {
    Parser::new(manifest, options).parse()
}

impl<'a> Parser<'a> {
    pub fn new(manifest: &'a FilteredManifest, options: ParseOptions) -> Self {
        Self { manifest, options }
    }

    /// Lowers every top-level stack, in block-map order.
    pub fn parse(&self) -> CompileResult<Forest> {
        let mut roots = Vec::new();
        for (id, block) in &self.manifest.blocks {
            // Loose reporters are serialized as arrays; they never run.
            if !block.is_object() || !is_top_level(block) {
                continue;
            }
            let opcode = block_opcode(block);
            if is_expression_opcode(opcode) {
                log::debug!("skipping loose reporter '{}' ({})", id, opcode);
                continue;
            }
            if let Some(root) = self.lower_stmt(Some(id.as_str()))? {
                log::debug!(
                    "lowered stack '{}' ({} statements)",
                    id,
                    root.iter().count()
                );
                roots.push(root);
            }
        }
        Ok(Forest::new(roots))
    }

    /// Lowers the stack starting at `id` by following `next` links.
    pub fn lower_stmt(&self, id: Option<&str>) -> CompileResult<Option<Stmt>> {
        let mut kinds = Vec::new();
        let mut visited = HashSet::new();
        let mut current = id.map(ToString::to_string);
        while let Some(block_id) = current {
            if !visited.insert(block_id.clone()) {
                return Err(CompileError::malformed(format!(
                    "cyclic block chain at '{}'.",
                    block_id
                )));
            }
            let block = self.manifest.block(&block_id)?;
            kinds.push(self.lower_stmt_kind(block)?);
            current = block_next(block).map(ToString::to_string);
        }
        Ok(Stmt::chain(kinds))
    }

    fn lower_stmt_kind(&self, block: &Value) -> CompileResult<StmtKind> {
        let op = block_opcode(block);
        let kind = match op {
            "flipperevents_whenProgramStarts" => StmtKind::WhenProgramStarts {
                x: block_coord(block, "x"),
                y: block_coord(block, "y"),
            },

            "data_setvariableto" => StmtKind::SetVariable {
                var: self.reference_field(block, "VARIABLE")?,
                value: self.input_expr(block, "VALUE")?,
            },
            "data_changevariableby" => StmtKind::ChangeVariable {
                var: self.reference_field(block, "VARIABLE")?,
                value: self.input_expr(block, "VALUE")?,
            },
            "data_addtolist" => StmtKind::AddItemToList {
                list: self.reference_field(block, "LIST")?,
                item: self.input_expr(block, "ITEM")?,
            },
            "data_deleteoflist" => StmtKind::DeleteItem {
                list: self.reference_field(block, "LIST")?,
                index: self.input_expr(block, "INDEX")?,
            },
            "data_deletealloflist" => StmtKind::DeleteAllItems {
                list: self.reference_field(block, "LIST")?,
            },
            "data_insertatlist" => StmtKind::InsertAt {
                list: self.reference_field(block, "LIST")?,
                item: self.input_expr(block, "ITEM")?,
                index: self.input_expr(block, "INDEX")?,
            },
            "data_replaceitemoflist" => StmtKind::ReplaceAt {
                list: self.reference_field(block, "LIST")?,
                index: self.input_expr(block, "INDEX")?,
                item: self.input_expr(block, "ITEM")?,
            },

            "flippermotor_motorTurnForDirection" => StmtKind::RunMotorForDuration {
                ports: self.port_input(block, "PORT")?,
                direction: TurnDirection::from_field(&required_field(block, "DIRECTION")?)?,
                value: self.input_expr(block, "VALUE")?,
                unit: MotorUnit::from_field(&required_field(block, "UNIT")?)?,
            },
            "flippermotor_motorGoDirectionToPosition" => StmtKind::MotorGoToPosition {
                ports: self.port_input(block, "PORT")?,
                direction: GoDirection::from_field(&required_field(block, "DIRECTION")?)?,
                position: self.input_expr(block, "POSITION")?,
            },
            "flippermotor_motorStartDirection" => StmtKind::StartMotor {
                ports: self.port_input(block, "PORT")?,
                direction: TurnDirection::from_field(&required_field(block, "DIRECTION")?)?,
            },
            "flippermotor_motorStop" => StmtKind::StopMotor {
                ports: self.port_input(block, "PORT")?,
            },
            "flippermotor_motorSetSpeed" => StmtKind::SetMotorSpeed {
                ports: self.port_input(block, "PORT")?,
                speed: self.input_expr(block, "SPEED")?,
            },

            "flippermove_move" => StmtKind::Move {
                direction: MoveDirection::from_field(&required_field(block, "DIRECTION")?)?,
                value: self.input_expr(block, "VALUE")?,
                unit: MoveUnit::from_field(&required_field(block, "UNIT")?)?,
            },
            "flippermove_steer" => StmtKind::MoveWithSteering {
                steering: self.input_expr(block, "STEERING")?,
                value: self.input_expr(block, "VALUE")?,
                unit: MoveUnit::from_field(&required_field(block, "UNIT")?)?,
            },
            "flippermove_startMove" => StmtKind::StartMoving {
                direction: MoveDirection::from_field(&required_field(block, "DIRECTION")?)?,
            },
            "flippermove_startSteer" => StmtKind::StartSteering {
                steering: self.input_expr(block, "STEERING")?,
            },
            "flippermove_stopMove" => StmtKind::StopMoving,
            "flippermove_movementSpeed" => StmtKind::SetMovementSpeed {
                speed: self.input_expr(block, "SPEED")?,
            },
            "flippermove_setMovementPair" => StmtKind::SetMovementMotors {
                ports: self.pair_input(block, "PAIR")?,
            },
            "flippermove_setDistance" => StmtKind::SetMotorRotation {
                distance: self.input_expr(block, "DISTANCE")?,
                unit: DistanceUnit::from_field(&required_field(block, "UNIT")?)?,
            },

            "flipperlight_lightDisplayImageOnForTime" => StmtKind::TurnOnFor {
                pattern: self.input_expr(block, "MATRIX")?,
                duration: self.input_expr(block, "VALUE")?,
            },
            "flipperlight_lightDisplayImageOn" => StmtKind::TurnOn {
                pattern: self.input_expr(block, "MATRIX")?,
            },
            "flipperlight_lightDisplayText" => StmtKind::Write {
                text: self.input_expr(block, "TEXT")?,
            },
            "flipperlight_lightDisplayOff" => StmtKind::TurnOff,
            "flipperlight_lightDisplaySetBrightness" => StmtKind::SetPixelBrightness {
                brightness: self.input_expr(block, "BRIGHTNESS")?,
            },
            "flipperlight_lightDisplaySetPixel" => StmtKind::SetPixel {
                x: self.input_expr(block, "X")?,
                y: self.input_expr(block, "Y")?,
                brightness: self.input_expr(block, "BRIGHTNESS")?,
            },
            "flipperlight_centerButtonLight" => StmtKind::SetCenterButton {
                color: self.input_expr(block, "COLOR")?,
            },
            "flipperlight_ultrasonicLightUp" => StmtKind::LightUpDistanceSensor {
                port: self.port_input(block, "PORT")?,
                pattern: self.input_expr(block, "VALUE")?,
            },

            "flippersound_playSoundUntilDone" => StmtKind::PlaySoundUntilDone {
                sound: self.sound_input(block)?,
            },
            "flippersound_playSound" => StmtKind::StartSound {
                sound: self.sound_input(block)?,
            },
            "flippersound_beepForTime" => StmtKind::PlayBeep {
                note: self.input_expr(block, "NOTE")?,
                duration: self.input_expr(block, "DURATION")?,
            },
            "flippersound_beep" => StmtKind::StartBeep {
                note: self.input_expr(block, "NOTE")?,
            },
            "flippersound_stopSound" => StmtKind::StopBeep,
            "sound_setvolumeto" => StmtKind::SetVolume {
                volume: self.input_expr(block, "VOLUME")?,
            },
            "sound_changevolumeby" => StmtKind::ChangeVolume {
                volume: self.input_expr(block, "VOLUME")?,
            },

            "control_wait" => StmtKind::WaitForSeconds {
                duration: self.input_expr(block, "DURATION")?,
            },
            "control_wait_until" => StmtKind::WaitUntil {
                condition: self.input_expr(block, "CONDITION")?,
            },
            "control_repeat" => StmtKind::RepeatLoop {
                times: self.input_expr(block, "TIMES")?,
                body: self.substack(block, "SUBSTACK")?,
            },
            "control_forever" => StmtKind::ForeverLoop {
                body: self.substack(block, "SUBSTACK")?,
            },
            "control_repeat_until" => StmtKind::RepeatUntil {
                condition: self.input_expr(block, "CONDITION")?,
                body: self.substack(block, "SUBSTACK")?,
            },
            "control_if" => StmtKind::IfThen {
                condition: self.input_expr(block, "CONDITION")?,
                body: self.substack(block, "SUBSTACK")?,
            },
            "control_if_else" => StmtKind::IfElse {
                condition: self.input_expr(block, "CONDITION")?,
                body: self.substack(block, "SUBSTACK")?,
                else_body: self.substack(block, "SUBSTACK2")?,
            },

            "flippersensors_resetTimer" => StmtKind::ResetTimer,
            "flippersensors_resetYaw" => StmtKind::SetYawAngle,

            other => match unsupported_feature(other) {
                Some((name, feature)) => StmtKind::Placeholder {
                    block: name.to_string(),
                    feature: Some(feature),
                },
                None if self.options.best_effort => {
                    log::warn!("no lowering for statement '{}', emitting a placeholder", other);
                    StmtKind::Placeholder {
                        block: other.to_string(),
                        feature: None,
                    }
                }
                None => return Err(CompileError::unsupported_opcode(other)),
            },
        };
        Ok(kind)
    }

    /// Lowers a slot binding: either a nested block id or a shadow literal.
    pub fn lower_expr(&self, binding: &Value) -> CompileResult<Expr> {
        if let Some(block_id) = binding.as_str() {
            return self.lower_expr_block(block_id);
        }
        let Some(arr) = binding.as_array() else {
            return Err(CompileError::malformed(format!(
                "unexpected slot binding {}.",
                binding
            )));
        };
        match arr.first().and_then(Value::as_i64) {
            // A bare primitive such as [4, "10"] or [12, "name", "id"].
            Some(code) if code >= 4 => self.lower_primitive(arr),
            // A slot wrapper: [kind, payload, shadow?].
            Some(_) => match arr.get(1) {
                Some(Value::Null) | None => match arr.get(2) {
                    Some(shadow) if !shadow.is_null() => self.lower_expr(shadow),
                    _ => Ok(Expr::number(0.0)),
                },
                Some(payload) => self.lower_expr(payload),
            },
            None => Err(CompileError::malformed(format!(
                "slot binding {} has no kind tag.",
                binding
            ))),
        }
    }

    fn lower_primitive(&self, arr: &[Value]) -> CompileResult<Expr> {
        let code = arr.first().and_then(Value::as_i64).unwrap_or_default();
        let value = arr.get(1).unwrap_or(&Value::Null);
        match code {
            PRIMITIVE_VARIABLE | PRIMITIVE_LIST => Ok(Expr::Variable(primitive_reference(arr)?)),
            PRIMITIVE_BROADCAST => Ok(Expr::text(value.as_str().unwrap_or_default())),
            _ => Ok(match value {
                Value::Number(n) => Expr::number(n.as_f64().unwrap_or_default()),
                Value::String(s) => literal_expr(s),
                Value::Bool(b) => Expr::text(b.to_string()),
                _ => Expr::text(""),
            }),
        }
    }

    fn lower_expr_block(&self, id: &str) -> CompileResult<Expr> {
        let block = self.manifest.block(id)?;
        if let Some(value) = menu_value(block) {
            return Ok(Expr::Text(value));
        }
        let op = block_opcode(block);
        let expr = match op {
            "data_variable" => Expr::Variable(self.reference_field(block, "VARIABLE")?),
            "data_listcontents" => Expr::Variable(self.reference_field(block, "LIST")?),
            "data_itemoflist" => Expr::ItemOfList {
                list: self.reference_field(block, "LIST")?,
                index: self.boxed(block, "INDEX")?,
            },
            "data_itemnumoflist" => Expr::IndexOfItem {
                list: self.reference_field(block, "LIST")?,
                item: self.boxed(block, "ITEM")?,
            },
            "data_lengthoflist" => Expr::LengthOfList {
                list: self.reference_field(block, "LIST")?,
            },
            "data_listcontainsitem" => Expr::ListContains {
                list: self.reference_field(block, "LIST")?,
                item: self.boxed(block, "ITEM")?,
            },

            "operator_add" => self.arithmetic(block, ArithOp::Add)?,
            "operator_subtract" => self.arithmetic(block, ArithOp::Sub)?,
            "operator_multiply" => self.arithmetic(block, ArithOp::Mul)?,
            "operator_divide" => self.arithmetic(block, ArithOp::Div)?,
            "operator_lt" => self.comparison(block, Comparator::Less)?,
            "operator_equals" => self.comparison(block, Comparator::Equal)?,
            "operator_gt" => self.comparison(block, Comparator::Greater)?,
            "operator_and" => Expr::And(
                self.boxed(block, "OPERAND1")?,
                self.boxed(block, "OPERAND2")?,
            ),
            "operator_or" => Expr::Or(
                self.boxed(block, "OPERAND1")?,
                self.boxed(block, "OPERAND2")?,
            ),
            "operator_not" => Expr::Not(self.boxed(block, "OPERAND")?),
            "flipperoperator_isInBetween" => Expr::Between {
                value: self.boxed(block, "VALUE")?,
                low: self.boxed(block, "LOW")?,
                high: self.boxed(block, "HIGH")?,
            },
            "operator_join" => Expr::Join(
                self.boxed(block, "STRING1")?,
                self.boxed(block, "STRING2")?,
            ),
            "operator_letter_of" => Expr::LetterOf {
                index: self.boxed(block, "LETTER")?,
                text: self.boxed(block, "STRING")?,
            },
            "operator_length" => Expr::Length(self.boxed(block, "STRING")?),
            "operator_contains" => Expr::Contains {
                text: self.boxed(block, "STRING1")?,
                needle: self.boxed(block, "STRING2")?,
            },
            "operator_mod" => Expr::Modulo(self.boxed(block, "NUM1")?, self.boxed(block, "NUM2")?),
            "operator_round" => Expr::Round(self.boxed(block, "NUM")?),
            "operator_mathop" => {
                let func = MathFunc::from_field(&required_field(block, "OPERATOR")?)?;
                if func.arity() != 1 {
                    return Err(CompileError::invalid_enum(MathFunc::NAME, func.tag()));
                }
                Expr::MathFunction {
                    func,
                    arg: self.boxed(block, "NUM")?,
                    arg2: None,
                }
            }
            "flipperoperator_mathFunc2Params" => {
                let func = MathFunc::from_field(&required_field(block, "FUNCTION")?)?;
                if func.arity() != 2 {
                    return Err(CompileError::invalid_enum(MathFunc::NAME, func.tag()));
                }
                Expr::MathFunction {
                    func,
                    arg: self.boxed(block, "PARAM1")?,
                    arg2: Some(self.boxed(block, "PARAM2")?),
                }
            }
            "operator_random" => Expr::Random {
                low: self.boxed(block, "FROM")?,
                high: self.boxed(block, "TO")?,
            },

            "flippermotor_absolutePosition" => Expr::MotorPosition {
                port: Box::new(self.port_input(block, "PORT")?),
            },
            "flippermotor_speed" => Expr::MotorSpeed {
                port: Box::new(self.port_input(block, "PORT")?),
            },

            "flippersensors_color" => Expr::Color {
                port: Box::new(self.port_input(block, "PORT")?),
            },
            "flippersensors_isColor" => Expr::IsColor {
                port: Box::new(self.port_input(block, "PORT")?),
                color: self.boxed(block, "VALUE")?,
            },
            "flippersensors_reflectivity" => Expr::ReflectedLight {
                port: Box::new(self.port_input(block, "PORT")?),
            },
            "flippersensors_isReflectivity" => Expr::IsReflectedLight {
                port: Box::new(self.port_input(block, "PORT")?),
                comparator: Comparator::from_field(&required_field(block, "COMPARATOR")?)?,
                value: self.boxed(block, "VALUE")?,
            },
            "flippersensors_distance" => Expr::Distance {
                port: Box::new(self.port_input(block, "PORT")?),
                unit: DistanceUnit::from_field(&required_field(block, "UNIT")?)?,
            },
            "flippersensors_isDistance" => Expr::IsDistance {
                port: Box::new(self.port_input(block, "PORT")?),
                comparator: Comparator::from_field(&required_field(block, "COMPARATOR")?)?,
                value: self.boxed(block, "VALUE")?,
                unit: DistanceUnit::from_field(&required_field(block, "UNIT")?)?,
            },
            "flippersensors_motion" => Expr::Gesture,
            "flippersensors_ismotion" => {
                Expr::IsGesture(HubInteraction::from_field(&required_field(block, "MOTION")?)?)
            }
            "flippersensors_orientation" => Expr::Orientation,
            "flippersensors_isorientation" => Expr::IsOrientation(HubOrientation::from_field(
                &required_field(block, "ORIENTATION")?,
            )?),
            "flippersensors_orientationAxis" => {
                Expr::HubAngle(AngleUnit::from_field(&required_field(block, "AXIS")?)?)
            }
            "flippersensors_buttonIsPressed" => Expr::IsButton {
                button: ButtonType::from_field(&required_field(block, "BUTTON")?)?,
                action: ButtonAction::from_field(&required_field(block, "EVENT")?)?,
            },
            "flippersensors_timer" => Expr::TimerValue,
            "sound_volume" => Expr::Volume,
            "sensing_keypressed" => Expr::KeyPressed {
                key: self.boxed(block, "KEY_OPTION")?,
            },

            other if self.options.best_effort => {
                log::warn!("no lowering for expression '{}', substituting 0", other);
                Expr::number(0.0)
            }
            other => return Err(CompileError::unsupported_opcode(other)),
        };
        Ok(expr)
    }

    /// Missing slots read as 0, the value an empty Scratch slot reports.
    fn input_expr(&self, block: &Value, name: &str) -> CompileResult<Expr> {
        match block_input(block, name) {
            Some(binding) => self.lower_expr(binding),
            None => Ok(Expr::number(0.0)),
        }
    }

    fn boxed(&self, block: &Value, name: &str) -> CompileResult<Box<Expr>> {
        self.input_expr(block, name).map(Box::new)
    }

    fn arithmetic(&self, block: &Value, op: ArithOp) -> CompileResult<Expr> {
        Ok(Expr::Arithmetic {
            op,
            lhs: self.boxed(block, "NUM1")?,
            rhs: self.boxed(block, "NUM2")?,
        })
    }

    fn comparison(&self, block: &Value, op: Comparator) -> CompileResult<Expr> {
        Ok(Expr::Comparison {
            op,
            lhs: self.boxed(block, "OPERAND1")?,
            rhs: self.boxed(block, "OPERAND2")?,
        })
    }

    fn substack(&self, block: &Value, name: &str) -> CompileResult<Body> {
        Ok(self
            .lower_stmt(block_input_block_id(block, name))?
            .map(Box::new))
    }

    /// Port slots lower to a port list or a variable/list reference, nothing else.
    fn port_input(&self, block: &Value, name: &str) -> CompileResult<Expr> {
        self.port_binding(block, name, port_list)
    }

    fn pair_input(&self, block: &Value, name: &str) -> CompileResult<Expr> {
        self.port_binding(block, name, port_pair)
    }

    fn port_binding(
        &self,
        block: &Value,
        name: &str,
        letters_to_ports: fn(&str) -> CompileResult<Expr>,
    ) -> CompileResult<Expr> {
        let binding = block_input(block, name).ok_or_else(|| {
            CompileError::UnsupportedPortExpression {
                shape: format!("missing '{}' input on {}", name, block_opcode(block)),
            }
        })?;
        if let Some(id) = block_input_block_id(block, name) {
            let source = self.manifest.block(id)?;
            if let Some(letters) = menu_value(source) {
                return letters_to_ports(&letters);
            }
            return match block_opcode(source) {
                "data_variable" => Ok(Expr::Variable(self.reference_field(source, "VARIABLE")?)),
                "data_listcontents" => Ok(Expr::Variable(self.reference_field(source, "LIST")?)),
                other => Err(CompileError::UnsupportedPortExpression {
                    shape: other.to_string(),
                }),
            };
        }
        let primitive = binding
            .as_array()
            .and_then(|arr| arr.get(1))
            .and_then(Value::as_array)
            .or_else(|| binding.as_array());
        match primitive {
            Some(arr) => match arr.first().and_then(Value::as_i64) {
                Some(PRIMITIVE_VARIABLE | PRIMITIVE_LIST) => {
                    Ok(Expr::Variable(primitive_reference(arr)?))
                }
                Some(_) => match arr.get(1).and_then(Value::as_str) {
                    Some(letters) => letters_to_ports(letters),
                    None => Err(CompileError::UnsupportedPortExpression {
                        shape: "numeric literal".to_string(),
                    }),
                },
                None => Err(CompileError::UnsupportedPortExpression {
                    shape: binding.to_string(),
                }),
            },
            None => Err(CompileError::UnsupportedPortExpression {
                shape: binding.to_string(),
            }),
        }
    }

    /// Sound menus hold either a plain name or a JSON object with a `name` key.
    fn sound_input(&self, block: &Value) -> CompileResult<String> {
        let raw = match block_input_block_id(block, "SOUND") {
            Some(id) => menu_value(self.manifest.block(id)?),
            None => block_input(block, "SOUND")
                .and_then(Value::as_array)
                .and_then(|arr| arr.get(1))
                .and_then(Value::as_array)
                .and_then(|lit| lit.get(1))
                .and_then(Value::as_str)
                .map(ToString::to_string),
        }
        .ok_or_else(|| {
            CompileError::malformed(format!("{} has no sound selected.", block_opcode(block)))
        })?;
        let name = serde_json::from_str::<Value>(&raw)
            .ok()
            .and_then(|v| v.get("name").and_then(Value::as_str).map(ToString::to_string));
        Ok(name.unwrap_or(raw))
    }

    /// Resolves a `[name, id]` field, preferring the manifest's name for the id.
    fn reference_field(&self, block: &Value, field: &str) -> CompileResult<Reference> {
        let name = required_field(block, field)?;
        let id = field_id(block, field).unwrap_or_default();
        let canonical = self
            .manifest
            .variable(&id)
            .map(|v| v.name.clone())
            .or_else(|| self.manifest.list(&id).map(|l| l.name.clone()));
        Ok(Reference::new(canonical.unwrap_or(name), id))
    }
}

fn required_field(block: &Value, name: &str) -> CompileResult<String> {
    field_first_string(block, name).ok_or_else(|| {
        CompileError::malformed(format!(
            "{} block is missing field '{}'.",
            block_opcode(block),
            name
        ))
    })
}

fn primitive_reference(arr: &[Value]) -> CompileResult<Reference> {
    let name = arr
        .get(1)
        .and_then(Value::as_str)
        .ok_or_else(|| CompileError::malformed("variable reference without a name."))?;
    let id = arr.get(2).and_then(Value::as_str).unwrap_or_default();
    Ok(Reference::new(name, id))
}

/// Numeric text becomes a number; anything else stays a string.
fn literal_expr(raw: &str) -> Expr {
    match raw.trim().parse::<f64>() {
        Ok(value) if !raw.trim().is_empty() => Expr::number(value),
        _ => Expr::text(raw),
    }
}

fn port_letters_regex() -> CompileResult<&'static Regex> {
    static PORT_LETTERS: OnceLock<Result<Regex, regex::Error>> = OnceLock::new();
    PORT_LETTERS
        .get_or_init(|| Regex::new(r"^[A-F]+$"))
        .as_ref()
        .map_err(|e| CompileError::invariant(format!("port pattern: {}", e)))
}

/// Normalises a multi-port selector such as "EA" to `['A', 'E']`.
fn port_list(letters: &str) -> CompileResult<Expr> {
    let letters = letters.trim();
    if !port_letters_regex()?.is_match(letters) {
        return Err(CompileError::UnsupportedPortExpression {
            shape: format!("port selector '{}'", letters),
        });
    }
    let mut ports = letters.chars().collect::<Vec<_>>();
    ports.sort_unstable();
    ports.dedup();
    Ok(Expr::PortList(ports))
}

/// A movement pair keeps its letter order: "BA" puts B on the left.
fn port_pair(letters: &str) -> CompileResult<Expr> {
    let letters = letters.trim();
    let ports = letters.chars().collect::<Vec<_>>();
    if !port_letters_regex()?.is_match(letters) || ports.len() != 2 || ports[0] == ports[1] {
        return Err(CompileError::UnsupportedPortExpression {
            shape: format!("movement pair '{}'", letters),
        });
    }
    Ok(Expr::PortList(ports))
}

fn unsupported_feature(opcode: &str) -> Option<(&'static str, UnsupportedFeature)> {
    let entry = match opcode {
        "flipperlight_playAnimationUntilDone" => {
            ("play animation until done", UnsupportedFeature::Animations)
        }
        "flipperlight_startAnimation" => ("start animation", UnsupportedFeature::Animations),
        "event_broadcast" => ("broadcast", UnsupportedFeature::ParallelStacks),
        "event_broadcastandwait" => ("broadcast and wait", UnsupportedFeature::ParallelStacks),
        "sound_seteffectto" => ("set pitch effect", UnsupportedFeature::PitchEffects),
        "sound_changeeffectby" => ("change pitch effect", UnsupportedFeature::PitchEffects),
        "sound_cleareffects" => ("clear sound effects", UnsupportedFeature::PitchEffects),
        "flipperlight_lightDisplayRotate" => {
            ("rotate orientation", UnsupportedFeature::OrientationRotations)
        }
        "flipperlight_lightDisplaySetOrientation" => {
            ("set orientation", UnsupportedFeature::OrientationRotations)
        }
        "control_stop" | "flippercontrol_stop" => ("stop", UnsupportedFeature::StopBlocks),
        "flippercontrol_stopOtherStacks" => ("stop other stacks", UnsupportedFeature::StopBlocks),
        _ => return None,
    };
    Some(entry)
}

fn is_expression_opcode(opcode: &str) -> bool {
    opcode.starts_with("operator_")
        || opcode.starts_with("flipperoperator_")
        || matches!(
            opcode,
            "data_variable"
                | "data_listcontents"
                | "data_itemoflist"
                | "data_itemnumoflist"
                | "data_lengthoflist"
                | "data_listcontainsitem"
                | "flippermotor_absolutePosition"
                | "flippermotor_speed"
                | "flippersensors_color"
                | "flippersensors_isColor"
                | "flippersensors_reflectivity"
                | "flippersensors_isReflectivity"
                | "flippersensors_distance"
                | "flippersensors_isDistance"
                | "flippersensors_motion"
                | "flippersensors_ismotion"
                | "flippersensors_orientation"
                | "flippersensors_isorientation"
                | "flippersensors_orientationAxis"
                | "flippersensors_buttonIsPressed"
                | "flippersensors_timer"
                | "sound_volume"
                | "sensing_keypressed"
        )
}
