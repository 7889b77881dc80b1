/// Declares a static global `SOFA_MAC` instance protected by a `critical_section` mutex.
///
/// This macro creates a `static` singleton `SOFA_MAC` suitable for use in
/// interrupt-based environments, where the main thread, the alarm interrupts
/// and the radio's receive interrupt all need the same MAC.
///
/// # Arguments
/// - `$mac`: The concrete `SofaMac<..>` type
///
/// # Example
/// ```rust,ignore
/// type Mac = SofaMac<MyRadio, AddressFramer, MyAlarms, MyRng, MyApp>;
/// init_sofa_mac!(Mac);
/// ```
#[macro_export]
macro_rules! init_sofa_mac {
    ( $mac:ty ) => {
        pub static SOFA_MAC: $crate::critical_section::Mutex<
            ::core::cell::RefCell<::core::option::Option<$mac>>,
        > = $crate::critical_section::Mutex::new(::core::cell::RefCell::new(
            ::core::option::Option::None,
        ));
    };
}

/// Stores a MAC in the global `SOFA_MAC` and starts its duty cycle.
///
/// # Notes
/// - Requires `init_sofa_mac!` to have been used earlier.
#[macro_export]
macro_rules! setup_sofa_mac {
    ( $mac:expr ) => {
        $crate::timer::global_sofa_setup(&SOFA_MAC, $mac)
    };
}

/// Calls `on_timer()` on the global `SOFA_MAC` if it has been set up.
///
/// # Example
/// ```rust,ignore
/// #[interrupt]
/// fn RTC0() {
///     sofa_timer_fired!(TimerId::PowerCycle);
/// }
/// ```
///
/// # Notes
/// - Safe to call before setup; the firing is dropped.
#[macro_export]
macro_rules! sofa_timer_fired {
    ( $id:expr ) => {
        $crate::critical_section::with(|cs| {
            if let ::core::option::Option::Some(mac) = SOFA_MAC.borrow(cs).borrow_mut().as_mut() {
                mac.on_timer($id);
            }
        })
    };
}

/// Calls `on_frame_received()` on the global `SOFA_MAC` if it has been set up.
///
/// # Example
/// ```rust,ignore
/// #[interrupt]
/// fn RADIO() {
///     let len = radio.read_fifo(&mut buf);
///     sofa_frame_received!(&buf[..len]);
/// }
/// ```
#[macro_export]
macro_rules! sofa_frame_received {
    ( $frame:expr ) => {
        $crate::critical_section::with(|cs| {
            if let ::core::option::Option::Some(mac) = SOFA_MAC.borrow(cs).borrow_mut().as_mut() {
                mac.on_frame_received($frame);
            }
        })
    };
}
