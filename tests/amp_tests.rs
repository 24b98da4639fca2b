use briny_kernel::amp::{
    AmpDtype, AmpError, AmpLevel, AmpState, AutoCast, FixedAmpState, GlobalAmpState,
    autocast_dtype_in, get_autocast_gpu_dtype, is_autocast_enabled, is_autocast_enabled_in,
    set_amp_dtype, set_amp_level,
};

#[test]
fn test_injected_state() {
    let off = FixedAmpState::default();
    assert!(!is_autocast_enabled_in(&off));
    assert_eq!(autocast_dtype_in(&off), AmpDtype::Float16);

    for level in [AmpLevel::O1, AmpLevel::O2] {
        let on = FixedAmpState::new(level, AmpDtype::BFloat16);
        assert!(is_autocast_enabled_in(&on));
        assert_eq!(autocast_dtype_in(&on), AmpDtype::BFloat16);
    }
}

#[test]
fn test_level_and_dtype_names() {
    assert_eq!("o2".parse::<AmpLevel>(), Ok(AmpLevel::O2));
    assert_eq!(AmpLevel::O1.to_string(), "O1");
    assert_eq!(
        "O3".parse::<AmpLevel>(),
        Err(AmpError::UnknownLevel("O3".to_owned()))
    );

    assert_eq!("bf16".parse::<AmpDtype>(), Ok(AmpDtype::BFloat16));
    assert_eq!("Float16".parse::<AmpDtype>(), Ok(AmpDtype::Float16));
    assert_eq!(AmpDtype::BFloat16.to_string(), "bfloat16");
    assert_eq!(AmpDtype::Float32.size_in_bytes(), 4);
    assert!("int8".parse::<AmpDtype>().is_err());
}

#[test]
fn test_level_round_trips_through_u8() {
    for level in [AmpLevel::O0, AmpLevel::O1, AmpLevel::O2] {
        assert_eq!(AmpLevel::try_from(level as u8), Ok(level));
    }
    for dtype in [AmpDtype::Float16, AmpDtype::BFloat16, AmpDtype::Float32] {
        assert_eq!(AmpDtype::try_from(dtype as u8), Ok(dtype));
    }
    assert!(AmpLevel::try_from(3_u8).is_err());
    assert!(AmpDtype::try_from(7_u8).is_err());
}

// Global state is process-wide, so every check against it lives in this one test.
#[test]
fn test_global_state() {
    let _ = env_logger::builder().is_test(true).try_init();

    assert!(!is_autocast_enabled());
    assert_eq!(get_autocast_gpu_dtype(), AmpDtype::Float16);

    {
        let _guard = AutoCast::new(true, AmpLevel::O1, AmpDtype::BFloat16);
        assert!(is_autocast_enabled());
        assert_eq!(get_autocast_gpu_dtype(), AmpDtype::BFloat16);
        assert_eq!(GlobalAmpState.amp_level(), AmpLevel::O1);

        {
            let _off = AutoCast::disable();
            assert!(!is_autocast_enabled());
            assert_eq!(get_autocast_gpu_dtype(), AmpDtype::BFloat16);
        }
        assert!(is_autocast_enabled());
    }
    assert!(!is_autocast_enabled());
    assert_eq!(get_autocast_gpu_dtype(), AmpDtype::Float16);

    {
        let _guard = AutoCast::new(false, AmpLevel::O2, AmpDtype::Float32);
        assert!(!is_autocast_enabled());
        assert_eq!(get_autocast_gpu_dtype(), AmpDtype::Float32);
    }

    assert_eq!(set_amp_level(AmpLevel::O2), AmpLevel::O0);
    assert_eq!(set_amp_dtype(AmpDtype::BFloat16), AmpDtype::Float16);
    assert!(is_autocast_enabled());
    assert_eq!(set_amp_level(AmpLevel::O0), AmpLevel::O2);
    set_amp_dtype(AmpDtype::Float16);
}
