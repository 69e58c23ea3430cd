//! Headless demo: a squad of drones hunting a runner through a small level.
//!
//! Usage: `drone-sim [config.json] [seconds]`. Set `RUST_LOG=debug` for
//! state transitions and `DRONE_SIM_PROFILE=1` to turn on profiler scopes.

use drone_ai::constants::TICK_DT;
use drone_ai::debug::RecordingSink;
use drone_ai::sandbox::Sandbox;
use drone_ai::{
    AiConfig, AiEvent, AiWorld, AttackKind, DroneParams, IdleState, LevelMap, Physics,
};
use glam::Vec2;

const LEVEL: &[&str] = &[
    "##############################",
    "#aaaaaaaaa#bbbbbbbbbbb#cccccc#",
    "#aaaaaaaaa#bbbbbbbbbbb#cccccc#",
    "#aaaaaaaaa+bbbbbbbbbbb+cccccc#",
    "#aaaaaaaaa#bbbbbbbbbbb#cccccc#",
    "#aaaaaaaaa#bbbbbbbbbbb#cccccc#",
    "#####+#########+########+#####",
    "#............................#",
    "#............................#",
    "##############################",
];

/// Corners of the runner's loop
const ROUTE: &[Vec2] = &[
    Vec2::new(2.5, 7.5),
    Vec2::new(24.5, 7.5),
    Vec2::new(24.5, 3.5),
    Vec2::new(15.5, 3.5),
    Vec2::new(15.5, 7.5),
];

const RUNNER_SPEED: f32 = 3.0;

fn main() -> drone_ai::Result<()> {
    drone_ai::logging::init(tracing::Level::INFO);
    puffin::set_scopes_on(std::env::var_os("DRONE_SIM_PROFILE").is_some());

    let mut args = std::env::args().skip(1);
    let config = match args.next() {
        Some(path) if path.ends_with(".json") => AiConfig::from_path(path)?,
        _ => AiConfig::default(),
    };
    let seconds: f32 = args.next().and_then(|s| s.parse().ok()).unwrap_or(30.0);
    let ticks = (seconds / TICK_DT).round() as u64;

    let level = LevelMap::from_ascii(LEVEL);
    let mut sandbox = Sandbox::new(&level);
    let mut world = AiWorld::new(config, &level);

    let runner = sandbox.spawn_dynamic(ROUTE[0], 0.35);
    world.set_hunted(Some(runner));

    let patrol = IdleState::patrol(vec![Vec2::new(13.5, 2.5), Vec2::new(19.5, 4.5)]);
    let drones = [
        (Vec2::new(4.5, 2.5), DroneParams::default(), IdleState::Point { home: Vec2::new(4.5, 2.5) }),
        (
            Vec2::new(13.5, 2.5),
            DroneParams {
                attack: AttackKind::Burst,
                ..DroneParams::default()
            },
            patrol,
        ),
        (
            Vec2::new(26.5, 2.5),
            DroneParams {
                attack: AttackKind::SniperLaser,
                attack_range_max: 14.0,
                optimal_distance: 9.0,
                ..DroneParams::turret()
            },
            IdleState::Point { home: Vec2::new(26.5, 2.5) },
        ),
        (
            Vec2::new(7.5, 4.5),
            DroneParams::default(),
            IdleState::resource(Vec2::new(7.5, 4.5), Vec2::new(2.5, 1.5)),
        ),
    ];
    let mut ids = Vec::with_capacity(drones.len());
    for (position, params, idle) in drones {
        let body = sandbox.spawn_agent(position, 0.3);
        world.spawn_drone(&sandbox, body, params, idle)?;
        ids.push(body);
    }

    let mut leg = 1;
    let mut shots = 0usize;
    let mut transitions = 0usize;
    for tick in 0..ticks {
        puffin::GlobalProfiler::lock().new_frame();

        // The runner follows its loop; the host drives it, not the AI
        if let Some(body) = sandbox.body(runner) {
            let goal = ROUTE[leg];
            if body.position.distance(goal) < 0.3 {
                leg = (leg + 1) % ROUTE.len();
            }
            let heading = (goal - body.position).normalize_or_zero();
            sandbox.set_velocity(runner, heading * RUNNER_SPEED);
            world.update_activation(&sandbox, body.position);
        }

        world.tick(&mut sandbox, &level);
        sandbox.step(world.clock().dt);

        for event in world.drain_events() {
            match event {
                AiEvent::Fire { shooter, aim } => {
                    shots += 1;
                    if let Some(body) = sandbox.body(shooter) {
                        let direction = (aim - body.position).normalize_or_zero();
                        sandbox.spawn_projectile(body.position + direction * 0.4, direction * 14.0);
                    }
                }
                AiEvent::StateChanged { agent, from, to } => {
                    transitions += 1;
                    tracing::info!("t={:.2} {:?}: {:?} -> {:?}", world.clock().time, agent, from, to);
                }
                other => tracing::debug!("{:?}", other),
            }
        }

        if tick % (5.0 / TICK_DT) as u64 == 0 {
            for &id in &ids {
                tracing::info!("\n{}", world.describe(id)?);
            }
        }
    }

    let mut sink = RecordingSink::new();
    world.draw_debug(&sandbox, &mut sink);
    tracing::info!(
        "Done: {:.1}s simulated, {} transitions, {} shots, {} squads, {} debug draws",
        world.clock().time,
        transitions,
        shots,
        world.squads().len(),
        sink.commands.len()
    );
    Ok(())
}
