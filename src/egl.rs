//! EGL bring-up through ANGLE's D3D11 back end.
//!
//! ANGLE only initializes a display if the requested D3D11 feature level is available, so
//! we walk three sets of display attributes: feature level 10_0+, then 9_3, then the WARP
//! software rasterizer.

use std::ffi::c_void;

use khronos_egl as egl;

use crate::check;
use crate::error::XrAppError;
use crate::owned::Owned;
use crate::Result;

// EGL_ANGLE_platform_angle and friends.
pub const PLATFORM_ANGLE_ANGLE: egl::Enum = 0x3202;
pub const PLATFORM_ANGLE_TYPE_ANGLE: egl::Int = 0x3203;
pub const PLATFORM_ANGLE_MAX_VERSION_MAJOR_ANGLE: egl::Int = 0x3204;
pub const PLATFORM_ANGLE_MAX_VERSION_MINOR_ANGLE: egl::Int = 0x3205;
pub const PLATFORM_ANGLE_TYPE_D3D11_ANGLE: egl::Int = 0x3208;
pub const PLATFORM_ANGLE_DEVICE_TYPE_ANGLE: egl::Int = 0x3209;
pub const PLATFORM_ANGLE_DEVICE_TYPE_D3D_WARP_ANGLE: egl::Int = 0x320B;
pub const PLATFORM_ANGLE_ENABLE_AUTOMATIC_TRIM_ANGLE: egl::Int = 0x320F;

const CONFIG_ATTRIBS: [egl::Int; 15] = [
    egl::RENDERABLE_TYPE,
    egl::OPENGL_ES2_BIT,
    egl::RED_SIZE,
    8,
    egl::GREEN_SIZE,
    8,
    egl::BLUE_SIZE,
    8,
    egl::ALPHA_SIZE,
    8,
    egl::DEPTH_SIZE,
    24,
    egl::STENCIL_SIZE,
    8,
    egl::NONE,
];

const CONTEXT_ATTRIBS: [egl::Int; 3] = [egl::CONTEXT_CLIENT_VERSION, 3, egl::NONE];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayTier {
    /// D3D11 feature level 10_0 or better on the default GPU.
    FeatureLevel10,
    /// D3D11 capped at feature level 9_3, for GPUs without 10_0.
    FeatureLevel9_3,
    /// Feature level 11_0 on WARP.
    Warp,
}

impl DisplayTier {
    pub const ORDER: [DisplayTier; 3] = [
        DisplayTier::FeatureLevel10,
        DisplayTier::FeatureLevel9_3,
        DisplayTier::Warp,
    ];

    /// `eglGetPlatformDisplayEXT` attribute list for this tier, `EGL_NONE`-terminated.
    pub fn attributes(self) -> Vec<egl::Int> {
        let mut attribs = vec![PLATFORM_ANGLE_TYPE_ANGLE, PLATFORM_ANGLE_TYPE_D3D11_ANGLE];
        match self {
            DisplayTier::FeatureLevel10 => {}
            DisplayTier::FeatureLevel9_3 => attribs.extend([
                PLATFORM_ANGLE_MAX_VERSION_MAJOR_ANGLE,
                9,
                PLATFORM_ANGLE_MAX_VERSION_MINOR_ANGLE,
                3,
            ]),
            DisplayTier::Warp => attribs.extend([
                PLATFORM_ANGLE_DEVICE_TYPE_ANGLE,
                PLATFORM_ANGLE_DEVICE_TYPE_D3D_WARP_ANGLE,
            ]),
        }
        // Lets ANGLE trim the DXGI device when the app is suspended.
        attribs.extend([
            PLATFORM_ANGLE_ENABLE_AUTOMATIC_TRIM_ANGLE,
            egl::TRUE as egl::Int,
            egl::NONE,
        ]);
        attribs
    }
}

pub trait DisplayPlatform {
    type Display;

    /// Fetch a display handle for the given attributes. Failing to get one at all is
    /// fatal; it does not move on to the next tier.
    fn platform_display(&self, attribs: &[egl::Int]) -> Result<Self::Display>;
    fn initialize(&self, display: &Self::Display) -> bool;
    fn terminate(&self, display: Self::Display);
}

/// Walk the tiers until a display initializes. The display from a failed tier is
/// terminated before the next tier's display is fetched.
pub fn initialize_display<P: DisplayPlatform>(platform: &P) -> Result<(P::Display, DisplayTier)> {
    for tier in DisplayTier::ORDER {
        let display = Owned::new(platform.platform_display(&tier.attributes())?, move |d| {
            platform.terminate(d)
        });
        if platform.initialize(display.get()) {
            log::info!("EGL display initialized with {:?}", tier);
            return Ok((display.into_inner(), tier));
        }
        log::warn!("eglInitialize failed with {:?}", tier);
    }
    Err(XrAppError::external(
        "eglInitialize",
        "EGL_FALSE for every display tier",
        file!(),
        line!(),
    ))
}

type GetPlatformDisplayExt =
    unsafe extern "system" fn(egl::Enum, *mut c_void, *const egl::Int) -> *mut c_void;

/// ANGLE's EGL, loaded at run time.
pub struct AnglePlatform {
    egl: egl::DynamicInstance<egl::EGL1_4>,
    get_platform_display: GetPlatformDisplayExt,
}

impl AnglePlatform {
    pub fn load() -> Result<Self> {
        let egl = check!(unsafe { egl::DynamicInstance::<egl::EGL1_4>::load_required() })?;

        // eglGetPlatformDisplayEXT is the variant of eglGetDisplay that takes attributes,
        // which is how ANGLE is told what kind of D3D11 device to create.
        let proc = egl
            .get_proc_address("eglGetPlatformDisplayEXT")
            .ok_or_else(|| XrAppError::unavailable("eglGetPlatformDisplayEXT"))?;
        let get_platform_display =
            unsafe { std::mem::transmute::<extern "system" fn(), GetPlatformDisplayExt>(proc) };

        Ok(Self {
            egl,
            get_platform_display,
        })
    }
}

impl DisplayPlatform for AnglePlatform {
    type Display = egl::Display;

    fn platform_display(&self, attribs: &[egl::Int]) -> Result<egl::Display> {
        let raw = unsafe {
            (self.get_platform_display)(PLATFORM_ANGLE_ANGLE, egl::DEFAULT_DISPLAY, attribs.as_ptr())
        };
        if raw.is_null() {
            return Err(XrAppError::external(
                "eglGetPlatformDisplayEXT",
                self.egl.get_error(),
                file!(),
                line!(),
            ));
        }
        Ok(unsafe { egl::Display::from_ptr(raw) })
    }

    fn initialize(&self, display: &egl::Display) -> bool {
        match self.egl.initialize(*display) {
            Ok((major, minor)) => {
                log::debug!("EGL {}.{}", major, minor);
                true
            }
            Err(e) => {
                log::debug!("eglInitialize: {}", e);
                false
            }
        }
    }

    fn terminate(&self, display: egl::Display) {
        if let Err(e) = self.egl.terminate(display) {
            log::warn!("eglTerminate: {}", e);
        }
    }
}

/// A current GLES 3 context on a pbuffer surface. Everything is torn down on drop.
pub struct EglContext<'a> {
    pub tier: DisplayTier,
    platform: &'a AnglePlatform,
    surface: Owned<'a, egl::Surface>,
    context: Owned<'a, egl::Context>,
    display: Owned<'a, egl::Display>,
}

impl<'a> EglContext<'a> {
    pub fn new(platform: &'a AnglePlatform, pbuffer_size: (i32, i32)) -> Result<Self> {
        let egl = &platform.egl;

        let (display, tier) = initialize_display(platform)?;
        let display = Owned::new(display, move |d| platform.terminate(d));

        let config = check!(egl.choose_first_config(*display.get(), &CONFIG_ATTRIBS))?
            .ok_or_else(|| XrAppError::unavailable("EGL config"))?;

        let raw_display = *display.get();
        let context = check!(egl.create_context(raw_display, config, None, &CONTEXT_ATTRIBS))?;
        let context = Owned::new(context, move |c| {
            if let Err(e) = egl.destroy_context(raw_display, c) {
                log::warn!("eglDestroyContext: {}", e);
            }
        });

        let pbuffer_attribs = [
            egl::WIDTH,
            pbuffer_size.0,
            egl::HEIGHT,
            pbuffer_size.1,
            egl::TEXTURE_FORMAT,
            egl::TEXTURE_RGBA,
            egl::TEXTURE_TARGET,
            egl::TEXTURE_2D,
            egl::NONE,
        ];
        let surface = check!(egl.create_pbuffer_surface(raw_display, config, &pbuffer_attribs))?;
        let surface = Owned::new(surface, move |s| {
            if let Err(e) = egl.destroy_surface(raw_display, s) {
                log::warn!("eglDestroySurface: {}", e);
            }
        });

        check!(egl.make_current(
            raw_display,
            Some(*surface.get()),
            Some(*surface.get()),
            Some(*context.get())
        ))?;

        Ok(Self {
            tier,
            platform,
            surface,
            context,
            display,
        })
    }
}

impl Drop for EglContext<'_> {
    fn drop(&mut self) {
        if let Err(e) = self
            .platform
            .egl
            .make_current(*self.display.get(), None, None, None)
        {
            log::warn!("eglMakeCurrent: {}", e);
        }
        // Surface and context have to go before the display they belong to.
        self.surface.release();
        self.context.release();
        self.display.release();
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;

    /// Hands out display ids 0, 1, 2... and initializes only the ones listed in `working`.
    #[derive(Default)]
    struct ScriptedPlatform {
        working: Vec<u32>,
        missing_display_at: Option<u32>,
        log: RefCell<Vec<String>>,
        next: RefCell<u32>,
    }

    impl DisplayPlatform for ScriptedPlatform {
        type Display = u32;

        fn platform_display(&self, attribs: &[egl::Int]) -> Result<u32> {
            assert_eq!(attribs.last(), Some(&egl::NONE));
            let id = *self.next.borrow();
            *self.next.borrow_mut() += 1;
            if self.missing_display_at == Some(id) {
                return Err(XrAppError::external("eglGetPlatformDisplayEXT", 0x3008, file!(), line!()));
            }
            self.log.borrow_mut().push(format!("get {id}"));
            Ok(id)
        }

        fn initialize(&self, display: &u32) -> bool {
            self.log.borrow_mut().push(format!("init {display}"));
            self.working.contains(display)
        }

        fn terminate(&self, display: u32) {
            self.log.borrow_mut().push(format!("terminate {display}"));
        }
    }

    fn platform(working: &[u32]) -> ScriptedPlatform {
        ScriptedPlatform {
            working: working.to_vec(),
            ..Default::default()
        }
    }

    #[test]
    fn tier_attributes() {
        let fl10 = DisplayTier::FeatureLevel10.attributes();
        assert_eq!(
            fl10,
            vec![
                PLATFORM_ANGLE_TYPE_ANGLE,
                PLATFORM_ANGLE_TYPE_D3D11_ANGLE,
                PLATFORM_ANGLE_ENABLE_AUTOMATIC_TRIM_ANGLE,
                1,
                egl::NONE
            ]
        );
        let fl93 = DisplayTier::FeatureLevel9_3.attributes();
        assert!(fl93
            .windows(2)
            .any(|w| w == [PLATFORM_ANGLE_MAX_VERSION_MAJOR_ANGLE, 9]));
        assert!(fl93
            .windows(2)
            .any(|w| w == [PLATFORM_ANGLE_MAX_VERSION_MINOR_ANGLE, 3]));
        let warp = DisplayTier::Warp.attributes();
        assert!(warp.windows(2).any(|w| w
            == [
                PLATFORM_ANGLE_DEVICE_TYPE_ANGLE,
                PLATFORM_ANGLE_DEVICE_TYPE_D3D_WARP_ANGLE
            ]));
    }

    #[test]
    fn first_tier_succeeds() {
        let platform = platform(&[0]);
        let (display, tier) = initialize_display(&platform).unwrap();
        assert_eq!((display, tier), (0, DisplayTier::FeatureLevel10));
        assert_eq!(*platform.log.borrow(), vec!["get 0", "init 0"]);
    }

    #[test]
    fn falls_back_to_feature_level_9_3() {
        let platform = platform(&[1]);
        let (display, tier) = initialize_display(&platform).unwrap();
        assert_eq!((display, tier), (1, DisplayTier::FeatureLevel9_3));
        assert_eq!(
            *platform.log.borrow(),
            vec!["get 0", "init 0", "terminate 0", "get 1", "init 1"]
        );
    }

    #[test]
    fn falls_back_to_warp() {
        let platform = platform(&[2]);
        let (display, tier) = initialize_display(&platform).unwrap();
        assert_eq!((display, tier), (2, DisplayTier::Warp));
        assert_eq!(platform.log.borrow().iter().filter(|l| l.starts_with("terminate")).count(), 2);
    }

    #[test]
    fn all_tiers_failing_is_fatal() {
        let platform = platform(&[]);
        let err = initialize_display(&platform).unwrap_err();
        assert!(matches!(err, XrAppError::ExternalCall { call: "eglInitialize", .. }));
        assert_eq!(
            *platform.log.borrow(),
            vec![
                "get 0",
                "init 0",
                "terminate 0",
                "get 1",
                "init 1",
                "terminate 1",
                "get 2",
                "init 2",
                "terminate 2"
            ]
        );
    }

    #[test]
    fn missing_display_is_fatal_immediately() {
        let platform = ScriptedPlatform {
            working: vec![2],
            missing_display_at: Some(1),
            ..Default::default()
        };
        assert!(initialize_display(&platform).is_err());
        assert_eq!(*platform.log.borrow(), vec!["get 0", "init 0", "terminate 0"]);
    }
}
