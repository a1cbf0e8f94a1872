//! Per-tick orbit update rule
//!
//! Orbiting bodies advance their orbital angle by a fixed increment every
//! tick, and the central body advances its own spin. Angles are left
//! unbounded; rotation is periodic so they are consumed modulo 2π.

/// Spin increment of the central body (radians per tick)
pub const CENTRAL_SPIN_PER_TICK: f64 = 0.001;

/// A body revolving around the scene origin
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrbitingBody {
    angular_speed: f64,
    angle: f64,
}

impl OrbitingBody {
    pub fn new(angular_speed: f64) -> Self {
        Self {
            angular_speed,
            angle: 0.0,
        }
    }

    /// Radians advanced per tick
    pub fn angular_speed(&self) -> f64 {
        self.angular_speed
    }

    /// Accumulated orbital angle in radians
    pub fn angle(&self) -> f64 {
        self.angle
    }
}

/// The non-orbiting body at the origin that spins in place
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CentralBody {
    increment: f64,
    rotation: f64,
}

impl CentralBody {
    pub fn new(increment: f64) -> Self {
        Self {
            increment,
            rotation: 0.0,
        }
    }

    pub fn increment(&self) -> f64 {
        self.increment
    }

    /// Accumulated self-rotation in radians
    pub fn rotation(&self) -> f64 {
        self.rotation
    }
}

impl Default for CentralBody {
    fn default() -> Self {
        Self::new(CENTRAL_SPIN_PER_TICK)
    }
}

/// Advance every orbiting body and the central body by one tick
pub fn tick(bodies: &mut [OrbitingBody], central: &mut CentralBody) {
    advance_orbits(bodies);
    central.rotation += central.increment;
}

/// Advance only the orbiting bodies by one tick
pub fn advance_orbits(bodies: &mut [OrbitingBody]) {
    for body in bodies.iter_mut() {
        body.angle += body.angular_speed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SPEEDS: [f64; 8] = [0.01, 0.008, 0.006, 0.004, 0.005, 0.0045, 0.006, 0.007];

    #[test]
    fn test_angle_after_n_ticks() {
        let mut bodies: Vec<OrbitingBody> = SPEEDS.iter().map(|&s| OrbitingBody::new(s)).collect();
        let mut central = CentralBody::default();

        let n = 250;
        for _ in 0..n {
            tick(&mut bodies, &mut central);
        }

        for body in &bodies {
            let expected = n as f64 * body.angular_speed();
            assert!(
                (body.angle() - expected).abs() < 1e-9,
                "speed {} -> {} (expected {})",
                body.angular_speed(),
                body.angle(),
                expected
            );
        }
        assert!((central.rotation() - n as f64 * 0.001).abs() < 1e-9);
    }

    #[test]
    fn test_hundred_ticks_at_one_hundredth() {
        let mut bodies = [OrbitingBody::new(0.01)];
        let mut central = CentralBody::default();
        for _ in 0..100 {
            tick(&mut bodies, &mut central);
        }
        assert!((bodies[0].angle() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_single_tick_equals_speed() {
        let mut bodies: Vec<OrbitingBody> = SPEEDS.iter().map(|&s| OrbitingBody::new(s)).collect();
        let mut central = CentralBody::default();
        tick(&mut bodies, &mut central);

        for (body, speed) in bodies.iter().zip(SPEEDS) {
            assert_eq!(body.angle(), speed);
        }
        assert_eq!(central.rotation(), CENTRAL_SPIN_PER_TICK);
    }

    #[test]
    fn test_no_bodies_still_spins_center() {
        let mut central = CentralBody::default();
        tick(&mut [], &mut central);
        tick(&mut [], &mut central);
        assert!((central.rotation() - 0.002).abs() < 1e-12);
    }

    #[test]
    fn test_advance_orbits_matches_tick_for_bodies() {
        let mut ticked = [OrbitingBody::new(0.004), OrbitingBody::new(0.007)];
        let mut advanced = ticked;
        let mut central = CentralBody::default();
        for _ in 0..3 {
            tick(&mut ticked, &mut central);
            advance_orbits(&mut advanced);
        }
        assert_eq!(ticked, advanced);
    }

    #[test]
    fn test_angles_are_not_wrapped() {
        let mut bodies = [OrbitingBody::new(1.0)];
        let mut central = CentralBody::new(1.0);
        for _ in 0..10 {
            tick(&mut bodies, &mut central);
        }
        // 10 rad is past 2π and must not be normalized
        assert_eq!(bodies[0].angle(), 10.0);
        assert_eq!(central.rotation(), 10.0);
    }
}
