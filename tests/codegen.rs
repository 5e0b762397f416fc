use lms2py_core::codegen::{generate, generate_program, PythonProgram};
use lms2py_core::ir::{
    CenterButtonColor, Comparator, Expr, Forest, GoDirection, HubInteraction, MotorUnit,
    MoveDirection, MoveUnit, Reference, Stmt, StmtKind, TurnDirection, UnsupportedFeature,
};
use lms2py_core::CompileError;

const SKELETON: &str = "from mindstorms import MSHub, Motor, MotorPair, ColorSensor, DistanceSensor, App
from mindstorms.control import wait_for_seconds, wait_until, Timer
from mindstorms.operator import greater_than, greater_than_or_equal_to, less_than, less_than_or_equal_to, equal_to, not_equal_to
import math
# Create your objects here.
# Write your program here.
";

fn hat() -> StmtKind {
    StmtKind::WhenProgramStarts { x: None, y: None }
}

fn forest(stmts: Vec<StmtKind>) -> Forest {
    let mut kinds = vec![hat()];
    kinds.extend(stmts);
    Forest::new(Stmt::chain(kinds).into_iter().collect())
}

fn gen(stmts: Vec<StmtKind>) -> PythonProgram {
    generate_program(&forest(stmts)).expect("generate")
}

fn gen_err(stmts: Vec<StmtKind>) -> CompileError {
    generate_program(&forest(stmts)).unwrap_err()
}

fn body(stmts: Vec<StmtKind>) -> Option<Box<Stmt>> {
    Stmt::chain(stmts).map(Box::new)
}

fn run_motor(ports: Expr, direction: TurnDirection, value: f64, unit: MotorUnit) -> StmtKind {
    StmtKind::RunMotorForDuration {
        ports,
        direction,
        value: Expr::number(value),
        unit,
    }
}

fn my_list() -> Reference {
    Reference::new("my_list", "list1")
}

#[test]
fn s1_single_motor_rotations() {
    let program = gen(vec![run_motor(
        Expr::ports("A"),
        TurnDirection::Clockwise,
        1.0,
        MotorUnit::Rotations,
    )]);
    assert_eq!(program.declarations, ["motor_a = Motor('A')"]);
    assert_eq!(program.body, ["motor_a.run_for_rotations(1.0)"]);
}

#[test]
fn s2_counterclockwise_negates_the_value() {
    let program = gen(vec![run_motor(
        Expr::ports("A"),
        TurnDirection::CounterClockwise,
        1.0,
        MotorUnit::Rotations,
    )]);
    assert_eq!(program.body, ["motor_a.run_for_rotations(-1.0)"]);
}

#[test]
fn s3_multiple_ports_run_serially() {
    let program = gen(vec![run_motor(
        Expr::ports("AE"),
        TurnDirection::Clockwise,
        1.0,
        MotorUnit::Rotations,
    )]);
    assert_eq!(
        program.declarations,
        ["motor_a = Motor('A')", "motor_e = Motor('E')"]
    );
    assert_eq!(program.body.len(), 4);
    assert!(program.body[0].starts_with("# Note:"));
    assert!(program.body[1].starts_with("# "));
    assert_eq!(
        program.body[2..],
        ["motor_a.run_for_rotations(1.0)", "motor_e.run_for_rotations(1.0)"]
    );
}

#[test]
fn s4_if_then_writes_to_the_matrix() {
    let program = gen(vec![StmtKind::IfThen {
        condition: Expr::Comparison {
            op: Comparator::Equal,
            lhs: Box::new(Expr::number(1.0)),
            rhs: Box::new(Expr::number(1.0)),
        },
        body: body(vec![StmtKind::Write {
            text: Expr::text("Y"),
        }]),
    }]);
    assert!(program.declarations.contains(&"hub = MSHub()".to_string()));
    assert!(program
        .to_string()
        .contains("if (1.0 == 1.0):\n\thub.light_matrix.write('Y')\n"));
}

#[test]
fn s5_repeat_until_gesture() {
    let program = gen(vec![StmtKind::RepeatUntil {
        condition: Expr::IsGesture(HubInteraction::Shaken),
        body: body(vec![
            StmtKind::Write {
                text: Expr::text("Y"),
            },
            StmtKind::Write {
                text: Expr::text("_"),
            },
        ]),
    }]);
    assert!(program.to_string().contains(
        "while not (hub.motion_sensor.get_gesture() == 'shaken'):\n\thub.light_matrix.write('Y')\n\thub.light_matrix.write('_')\n"
    ));
}

#[test]
fn s6_variable_ports_loop_over_the_list() {
    let program = gen(vec![
        StmtKind::AddItemToList {
            list: my_list(),
            item: Expr::text("A"),
        },
        run_motor(
            Expr::Variable(my_list()),
            TurnDirection::Clockwise,
            1.0,
            MotorUnit::Rotations,
        ),
    ]);
    assert_eq!(program.declarations, ["my_list = []"]);
    assert_eq!(program.body.len(), 5);
    assert_eq!(program.body[0], "my_list.append('A')");
    assert!(program.body[1].starts_with("# Note:"));
    assert_eq!(
        program.body[3..],
        ["for port in my_list:", "\tMotor(port).run_for_rotations(1.0)"]
    );
}

#[test]
fn empty_forest_is_the_bare_skeleton() {
    assert_eq!(generate(&Forest::default()).expect("generate"), SKELETON);
}

#[test]
fn lone_hat_is_the_bare_skeleton() {
    assert_eq!(generate(&forest(vec![])).expect("generate"), SKELETON);
}

#[test]
fn six_ports_emit_six_declarations_in_order() {
    let program = gen(vec![run_motor(
        Expr::ports("ABCDEF"),
        TurnDirection::Clockwise,
        1.0,
        MotorUnit::Rotations,
    )]);
    let expected_decls = "ABCDEF"
        .chars()
        .map(|p| format!("motor_{} = Motor('{}')", p.to_ascii_lowercase(), p))
        .collect::<Vec<_>>();
    assert_eq!(program.declarations, expected_decls);
    let calls = program
        .body
        .iter()
        .filter(|line| !line.starts_with('#'))
        .cloned()
        .collect::<Vec<_>>();
    let expected_calls = "abcdef"
        .chars()
        .map(|p| format!("motor_{}.run_for_rotations(1.0)", p))
        .collect::<Vec<_>>();
    assert_eq!(calls, expected_calls);
}

#[test]
fn generation_is_deterministic() {
    let tree = forest(vec![
        run_motor(Expr::ports("BA"), TurnDirection::Clockwise, 2.0, MotorUnit::Seconds),
        StmtKind::SetVariable {
            var: Reference::new("speed", "var1"),
            value: Expr::Random {
                low: Box::new(Expr::number(1.0)),
                high: Box::new(Expr::number(6.0)),
            },
        },
    ]);
    assert_eq!(generate(&tree), generate(&tree));
}

#[test]
fn each_symbol_is_declared_once() {
    let program = gen(vec![
        run_motor(Expr::ports("A"), TurnDirection::Clockwise, 1.0, MotorUnit::Rotations),
        StmtKind::StopMotor {
            ports: Expr::ports("AB"),
        },
        StmtKind::Write {
            text: Expr::text("a"),
        },
        StmtKind::TurnOff,
        StmtKind::StopMoving,
        StmtKind::StopMoving,
    ]);
    let mut sorted = program.declarations.clone();
    sorted.sort();
    sorted.dedup();
    assert_eq!(sorted.len(), program.declarations.len());
    assert_eq!(program.declarations[0], "motor_a = Motor('A')");
    assert_eq!(program.declarations[1], "motor_b = Motor('B')");
    assert_eq!(program.declarations[2], "hub = MSHub()");
    assert_eq!(program.declarations[3], "motor_pair = MotorPair('A','B')");
    assert!(program.declarations[4].starts_with("motor_pair.set_default_speed(50)  # Note:"));
}

#[test]
fn counterclockwise_seconds_negate_the_value() {
    let program = gen(vec![
        run_motor(Expr::ports("C"), TurnDirection::CounterClockwise, 2.0, MotorUnit::Seconds),
        run_motor(Expr::ports("C"), TurnDirection::Clockwise, 2.0, MotorUnit::Seconds),
    ]);
    assert_eq!(
        program.body,
        ["motor_c.run_for_seconds(-2.0)", "motor_c.run_for_seconds(2.0)"]
    );
}

#[test]
fn degrees_are_converted_to_int_with_a_note() {
    let program = gen(vec![run_motor(
        Expr::ports("B"),
        TurnDirection::CounterClockwise,
        90.0,
        MotorUnit::Degrees,
    )]);
    assert_eq!(program.body.len(), 2);
    assert!(program.body[0].starts_with("# Note:"));
    assert_eq!(program.body[1], "motor_b.run_for_degrees(int(-90.0))");
}

#[test]
fn go_to_position_names_the_direction() {
    let program = gen(vec![StmtKind::MotorGoToPosition {
        ports: Expr::ports("D"),
        direction: GoDirection::Shortest,
        position: Expr::number(0.0),
    }]);
    assert_eq!(
        program.body.last().map(String::as_str),
        Some("motor_d.run_to_position(int(0.0), 'shortest path')")
    );
}

#[test]
fn motor_speed_and_start_templates() {
    let program = gen(vec![
        StmtKind::SetMotorSpeed {
            ports: Expr::ports("A"),
            speed: Expr::number(75.0),
        },
        StmtKind::StartMotor {
            ports: Expr::ports("A"),
            direction: TurnDirection::CounterClockwise,
        },
    ]);
    assert_eq!(
        program.body,
        [
            "motor_a.set_default_speed(int(75.0))",
            "motor_a.start(-motor_a.get_default_speed())"
        ]
    );
}

#[test]
fn movement_uses_the_default_pair() {
    let program = gen(vec![
        StmtKind::Move {
            direction: MoveDirection::Back,
            value: Expr::number(10.0),
            unit: MoveUnit::Cm,
        },
        StmtKind::MoveWithSteering {
            steering: Expr::number(30.0),
            value: Expr::number(2.0),
            unit: MoveUnit::Rotations,
        },
        StmtKind::StartMoving {
            direction: MoveDirection::Clockwise,
        },
        StmtKind::SetMovementMotors {
            ports: Expr::ports("CD"),
        },
    ]);
    assert_eq!(program.declarations.len(), 2);
    assert_eq!(
        program.body,
        [
            "motor_pair.move(-10.0, 'cm')",
            "motor_pair.move(2.0, 'rotations', steering=int(30.0))",
            "motor_pair.start(steering=100)",
            "motor_pair = MotorPair('C','D')"
        ]
    );
}

#[test]
fn movement_pair_from_a_variable_warns() {
    let program = gen(vec![StmtKind::SetMovementMotors {
        ports: Expr::Variable(my_list()),
    }]);
    assert_eq!(program.body.len(), 2);
    assert!(program.body[0].starts_with("# Note:"));
    assert_eq!(program.body[1], "motor_pair = MotorPair(my_list[0], my_list[1])");
}

#[test]
fn movement_pair_needs_two_ports() {
    assert!(matches!(
        gen_err(vec![StmtKind::SetMovementMotors {
            ports: Expr::ports("A")
        }]),
        CompileError::UnsupportedPortExpression { .. }
    ));
}

#[test]
fn light_patterns_declare_a_helper_once() {
    let pattern = "9909999099000009000909990";
    let program = gen(vec![
        StmtKind::TurnOnFor {
            pattern: Expr::text(pattern),
            duration: Expr::number(2.0),
        },
        StmtKind::TurnOn {
            pattern: Expr::text(pattern),
        },
    ]);
    assert_eq!(program.functions.len(), 3);
    assert_eq!(program.functions[0], "def _turn_on_pattern(pattern, brightness=100):");
    assert_eq!(
        program.body,
        [
            format!("_turn_on_pattern('{}')", pattern),
            "wait_for_seconds(int(2.0))".to_string(),
            "hub.light_matrix.off()".to_string(),
            format!("_turn_on_pattern('{}')", pattern),
        ]
    );
    let text = program.to_string();
    assert!(text.contains("# Declare you functions here.\ndef _turn_on_pattern("));
    assert!(text.contains(
        "\t\thub.light_matrix.set_pixel(i%5, int(i/5), int(brightness*int(pattern[i])/9.0))\n"
    ));
}

#[test]
fn brightness_flows_into_pattern_calls() {
    let program = gen(vec![
        StmtKind::SetPixelBrightness {
            brightness: Expr::number(50.0),
        },
        StmtKind::TurnOn {
            pattern: Expr::text("9"),
        },
    ]);
    assert_eq!(program.declarations, ["hub = MSHub()", "_brightness = 100"]);
    assert_eq!(
        program.body,
        ["_brightness = int(50.0)", "_turn_on_pattern('9', _brightness)"]
    );
}

#[test]
fn center_button_colours_resolve_by_index() {
    let program = gen(vec![StmtKind::SetCenterButton {
        color: Expr::text("9"),
    }]);
    assert_eq!(program.body, ["hub.status_light.on('red')"]);

    assert_eq!(
        gen_err(vec![StmtKind::SetCenterButton {
            color: Expr::text("2"),
        }]),
        CompileError::InvalidIndex {
            enum_name: CenterButtonColor::NAME,
            index: "2".to_string()
        }
    );
}

#[test]
fn sensor_colour_none_compares_with_is() {
    let program = gen(vec![StmtKind::WaitUntil {
        condition: Expr::IsColor {
            port: Box::new(Expr::ports("C")),
            color: Box::new(Expr::text("-1")),
        },
    }]);
    assert_eq!(program.declarations, ["color_sensor_c = ColorSensor('C')"]);
    assert_eq!(
        program.body,
        ["wait_until(lambda: color_sensor_c.get_color() is None)"]
    );
}

#[test]
fn expression_ports_need_a_single_port() {
    let position = |port: Expr| StmtKind::SetVariable {
        var: Reference::new("speed", "var1"),
        value: Expr::MotorPosition {
            port: Box::new(port),
        },
    };
    assert!(matches!(
        gen_err(vec![position(Expr::ports("AB"))]),
        CompileError::UnsupportedPortExpression { .. }
    ));
    let program = gen(vec![position(Expr::Variable(my_list()))]);
    assert_eq!(program.body, ["speed = Motor(my_list[0]).get_position()"]);
}

#[test]
fn distance_sensor_reads_and_lights() {
    let program = gen(vec![
        StmtKind::SetVariable {
            var: Reference::new("speed", "var1"),
            value: Expr::Distance {
                port: Box::new(Expr::ports("D")),
                unit: lms2py_core::ir::DistanceUnit::Cm,
            },
        },
        StmtKind::LightUpDistanceSensor {
            port: Expr::ports("D"),
            pattern: Expr::text("9090"),
        },
    ]);
    assert_eq!(program.declarations, ["distance_sensor_d = DistanceSensor('D')"]);
    assert_eq!(
        program.body,
        [
            "speed = distance_sensor_d.get_distance_cm()",
            "distance_sensor_d.light_up(100, 0, 100, 0)"
        ]
    );
}

#[test]
fn random_import_is_added_once() {
    let random = || Expr::Random {
        low: Box::new(Expr::number(1.0)),
        high: Box::new(Expr::number(6.0)),
    };
    let program = gen(vec![
        StmtKind::WaitForSeconds { duration: random() },
        StmtKind::WaitForSeconds { duration: random() },
    ]);
    assert!(program.preamble.ends_with("import math\nfrom random import randint\n"));
    assert_eq!(program.preamble.matches("randint").count(), 1);
    assert_eq!(program.body[0], "wait_for_seconds(randint(int(1.0), int(6.0)))");
}

#[test]
fn list_statements_shift_to_zero_based() {
    let program = gen(vec![
        StmtKind::ReplaceAt {
            list: my_list(),
            index: Expr::number(2.0),
            item: Expr::text("B"),
        },
        StmtKind::DeleteAllItems { list: my_list() },
    ]);
    assert!(program.body[0].starts_with("# Note:"));
    assert_eq!(program.body[1..], ["my_list[int(2.0)-1] = 'B'", "my_list.clear()"]);
}

#[test]
fn sounds_play_through_the_app() {
    let program = gen(vec![StmtKind::PlaySoundUntilDone {
        sound: "Cat Meow 1".to_string(),
    }]);
    assert_eq!(program.declarations, ["app = App()", "hub = MSHub()"]);
    assert_eq!(
        program.body,
        ["app.play_sound('Cat Meow 1')", "hub.light_matrix.write('Y')"]
    );
}

#[test]
fn empty_branches_emit_pass() {
    let program = gen(vec![StmtKind::IfElse {
        condition: Expr::IsGesture(HubInteraction::Tapped),
        body: None,
        else_body: None,
    }]);
    assert_eq!(
        program.body,
        [
            "if (hub.motion_sensor.get_gesture() == 'tapped'):",
            "\tpass",
            "else:",
            "\tpass"
        ]
    );
}

#[test]
fn nested_loops_indent_with_tabs() {
    let program = gen(vec![StmtKind::ForeverLoop {
        body: body(vec![StmtKind::RepeatLoop {
            times: Expr::number(4.0),
            body: body(vec![StmtKind::ResetTimer]),
        }]),
    }]);
    assert_eq!(
        program.body,
        [
            "while True:",
            "\t# Note: repeat counts are whole numbers, so the value is converted with int().",
            "\tfor _ in range(int(4.0)):",
            "\t\ttimer.reset()"
        ]
    );
}

#[test]
fn placeholders_name_the_block_and_feature() {
    let program = gen(vec![
        StmtKind::Placeholder {
            block: "broadcast".to_string(),
            feature: Some(UnsupportedFeature::ParallelStacks),
        },
        StmtKind::Placeholder {
            block: "flippermystery_doThing".to_string(),
            feature: None,
        },
    ]);
    assert_eq!(
        program.body,
        [
            "# Placeholder for the broadcast block. Note: that parallel stacks is not supported in Python at the moment.",
            "# Placeholder for the flippermystery_doThing block. Note: that flippermystery_doThing is not supported in Python at the moment.",
        ]
    );
}

#[test]
fn extra_stacks_follow_a_parallel_placeholder() {
    let first = Stmt::chain(vec![hat(), StmtKind::TurnOff]).expect("chain");
    let second = Stmt::chain(vec![hat(), StmtKind::StopBeep]).expect("chain");
    let program = generate_program(&Forest::new(vec![first, second])).expect("generate");
    assert_eq!(program.body.len(), 3);
    assert_eq!(program.body[0], "hub.light_matrix.off()");
    assert!(program.body[1].contains("parallel stacks"));
    assert_eq!(program.body[2], "hub.speaker.stop()");
}

#[test]
fn stacks_without_a_hat_are_left_out() {
    let loose = Stmt::new(StmtKind::Write {
        text: Expr::text("LOOSE"),
    });
    let started = Stmt::chain(vec![hat(), StmtKind::TurnOff]).expect("chain");
    let program = generate_program(&Forest::new(vec![loose, started])).expect("generate");
    assert_eq!(
        program.body,
        [
            "# Note: a stack without a when program starts block never runs, so it is left out.",
            "hub.light_matrix.off()"
        ]
    );
    assert!(program.body.iter().all(|line| !line.contains("LOOSE")));
}

#[test]
fn user_names_never_shadow_generated_objects() {
    let timer_list = Reference::new("timer", "list2");
    let program = gen(vec![
        StmtKind::AddItemToList {
            list: timer_list.clone(),
            item: Expr::number(1.0),
        },
        StmtKind::ResetTimer,
        StmtKind::SetVariable {
            var: Reference::new("hub", "var2"),
            value: Expr::LengthOfList { list: timer_list },
        },
        StmtKind::TurnOff,
    ]);
    assert_eq!(
        program.declarations,
        ["timer_ = []", "timer = Timer()", "hub = MSHub()"]
    );
    assert_eq!(
        program.body,
        [
            "timer_.append(1.0)",
            "timer.reset()",
            "hub_ = len(timer_)",
            "hub.light_matrix.off()"
        ]
    );
}

#[test]
fn key_presses_read_false_with_a_placeholder() {
    let program = gen(vec![StmtKind::IfThen {
        condition: Expr::KeyPressed {
            key: Box::new(Expr::text("space")),
        },
        body: body(vec![StmtKind::TurnOff]),
    }]);
    assert_eq!(
        program.body,
        [
            "# Placeholder for the key pressed block. Note: that key pressed is not supported in Python at the moment.",
            "if (False):",
            "\thub.light_matrix.off()"
        ]
    );
}

#[test]
fn nested_hats_are_an_invariant_violation() {
    assert!(matches!(
        gen_err(vec![StmtKind::ForeverLoop {
            body: body(vec![hat()]),
        }]),
        CompileError::InternalInvariantViolation(_)
    ));
}

#[test]
fn every_statement_kind_has_a_template() {
    let num = Expr::number;
    let program = generate_program(&forest(vec![
        StmtKind::SetVariable {
            var: Reference::new("speed", "v"),
            value: num(1.0),
        },
        StmtKind::ChangeVariable {
            var: Reference::new("speed", "v"),
            value: num(1.0),
        },
        StmtKind::AddItemToList {
            list: my_list(),
            item: num(1.0),
        },
        StmtKind::DeleteItem {
            list: my_list(),
            index: num(1.0),
        },
        StmtKind::DeleteAllItems { list: my_list() },
        StmtKind::InsertAt {
            list: my_list(),
            item: num(1.0),
            index: num(1.0),
        },
        StmtKind::ReplaceAt {
            list: my_list(),
            index: num(1.0),
            item: num(1.0),
        },
        run_motor(Expr::ports("A"), TurnDirection::Clockwise, 1.0, MotorUnit::Seconds),
        StmtKind::MotorGoToPosition {
            ports: Expr::ports("A"),
            direction: GoDirection::CounterClockwise,
            position: num(90.0),
        },
        StmtKind::StartMotor {
            ports: Expr::ports("A"),
            direction: TurnDirection::Clockwise,
        },
        StmtKind::StopMotor {
            ports: Expr::ports("A"),
        },
        StmtKind::SetMotorSpeed {
            ports: Expr::ports("A"),
            speed: num(50.0),
        },
        StmtKind::Move {
            direction: MoveDirection::Forward,
            value: num(10.0),
            unit: MoveUnit::Inches,
        },
        StmtKind::MoveWithSteering {
            steering: num(0.0),
            value: num(1.0),
            unit: MoveUnit::Seconds,
        },
        StmtKind::StartMoving {
            direction: MoveDirection::Back,
        },
        StmtKind::StartSteering { steering: num(-20.0) },
        StmtKind::StopMoving,
        StmtKind::SetMovementSpeed { speed: num(30.0) },
        StmtKind::SetMovementMotors {
            ports: Expr::ports("EF"),
        },
        StmtKind::SetMotorRotation {
            distance: num(17.5),
            unit: lms2py_core::ir::DistanceUnit::Cm,
        },
        StmtKind::TurnOnFor {
            pattern: Expr::text("9999999999999999999999999"),
            duration: num(1.0),
        },
        StmtKind::TurnOn {
            pattern: Expr::text("9999999999999999999999999"),
        },
        StmtKind::Write {
            text: Expr::text("Hi"),
        },
        StmtKind::TurnOff,
        StmtKind::SetPixelBrightness { brightness: num(75.0) },
        StmtKind::SetPixel {
            x: num(1.0),
            y: num(1.0),
            brightness: num(100.0),
        },
        StmtKind::SetCenterButton {
            color: Expr::text("5"),
        },
        StmtKind::LightUpDistanceSensor {
            port: Expr::ports("F"),
            pattern: Expr::text("9999"),
        },
        StmtKind::PlaySoundUntilDone {
            sound: "Hello".to_string(),
        },
        StmtKind::StartSound {
            sound: "Hello".to_string(),
        },
        StmtKind::PlayBeep {
            note: num(60.0),
            duration: num(0.2),
        },
        StmtKind::StartBeep { note: num(60.0) },
        StmtKind::StopBeep,
        StmtKind::SetVolume { volume: num(80.0) },
        StmtKind::ChangeVolume { volume: num(-10.0) },
        StmtKind::WaitForSeconds { duration: num(1.0) },
        StmtKind::WaitUntil {
            condition: Expr::TimerValue,
        },
        StmtKind::RepeatLoop {
            times: num(2.0),
            body: None,
        },
        StmtKind::ForeverLoop { body: None },
        StmtKind::RepeatUntil {
            condition: Expr::Volume,
            body: None,
        },
        StmtKind::IfThen {
            condition: Expr::Gesture,
            body: None,
        },
        StmtKind::IfElse {
            condition: Expr::Orientation,
            body: None,
            else_body: None,
        },
        StmtKind::ResetTimer,
        StmtKind::SetYawAngle,
        StmtKind::Placeholder {
            block: "stop".to_string(),
            feature: Some(UnsupportedFeature::StopBlocks),
        },
    ]))
    .expect("generate");
    assert!(program.body.len() > 40);
    assert!(program.body.iter().all(|line| !line.is_empty()));
}
